//! Local identity persistence.
//!
//! The sync queue is scoped to the current identity: queued operations are
//! discarded when no identity exists, and an identity change clears the
//! queue all-or-nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::LocalStore;
use crate::error::Result;

const IDENTITY_KEY: &str = "identity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    /// Authenticated server account
    Account,
    /// Device-local guest
    Guest,
}

/// The identity all local data and queued operations belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub kind: IdentityKind,
}

impl Identity {
    #[must_use]
    pub fn account(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: IdentityKind::Account,
        }
    }

    /// A fresh device-local guest identity
    #[must_use]
    pub fn guest() -> Self {
        Self {
            user_id: format!("guest-{}", Uuid::now_v7()),
            kind: IdentityKind::Guest,
        }
    }
}

/// Persisted identity accessor over the local kv table
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<LocalStore>,
}

impl IdentityStore {
    #[must_use]
    pub const fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// The currently active identity, if any
    pub async fn current(&self) -> Result<Option<Identity>> {
        let Some(raw) = self.store.kv_get(IDENTITY_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(identity) => Ok(Some(identity)),
            Err(error) => {
                tracing::warn!("discarding unreadable identity record: {error}");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, identity: &Identity) -> Result<()> {
        let raw = serde_json::to_string(identity)?;
        self.store.kv_set(IDENTITY_KEY, &raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.kv_delete(IDENTITY_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> IdentityStore {
        let db = Database::open_in_memory().await.unwrap();
        IdentityStore::new(Arc::new(LocalStore::new(db)))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_restore_identity() {
        let identities = setup().await;
        assert!(identities.current().await.unwrap().is_none());

        let account = Identity::account("user-42");
        identities.save(&account).await.unwrap();
        assert_eq!(identities.current().await.unwrap(), Some(account));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_removes_identity() {
        let identities = setup().await;
        identities.save(&Identity::guest()).await.unwrap();
        identities.clear().await.unwrap();
        assert!(identities.current().await.unwrap().is_none());
    }

    #[test]
    fn test_guest_identities_are_unique() {
        assert_ne!(Identity::guest().user_id, Identity::guest().user_id);
    }
}
