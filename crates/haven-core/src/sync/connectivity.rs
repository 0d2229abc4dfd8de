//! Shared connectivity flag.
//!
//! The engine only reads this; whatever transport monitoring the embedding
//! application has (browser online/offline events, a heartbeat probe) flips
//! it. Starts offline so a fresh engine never assumes reachability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    /// A flag starting in the offline state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag starting in the online state
    #[must_use]
    pub fn online() -> Self {
        let connectivity = Self::default();
        connectivity.set_online(true);
        connectivity
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::Relaxed);
        if was != online {
            tracing::info!("connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_offline() {
        assert!(!Connectivity::new().is_online());
        assert!(Connectivity::online().is_online());
    }

    #[test]
    fn test_clones_share_state() {
        let connectivity = Connectivity::new();
        let observer = connectivity.clone();
        connectivity.set_online(true);
        assert!(observer.is_online());
    }
}
