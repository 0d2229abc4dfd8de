//! Dashboard background (wallpaper) model

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind, SyncMeta, SyncedRecord};
use crate::error::{Error, Result};

const FEATURED_CATEGORY: &str = "featured";

/// A wallpaper available on the dashboard.
///
/// Built-in backgrounds ship with every install; they refuse deletion and
/// keep their name and image immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub id: EntityId,
    pub name: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub category: String,
    #[serde(default)]
    pub is_default: bool,
    pub owner_id: String,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

impl Background {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        image_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            image_url: image_url.into(),
            thumbnail_url: None,
            category: "custom".to_string(),
            is_default: false,
            owner_id: owner_id.into(),
            meta: SyncMeta::new(),
        }
    }
}

impl SyncedRecord for Background {
    const KIND: EntityKind = EntityKind::Background;

    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn meta(&self) -> &SyncMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }

    fn is_protected(&self) -> bool {
        self.is_default
    }

    fn guard_update(&self, incoming: &Self) -> Result<()> {
        if self.is_default
            && (incoming.name != self.name
                || incoming.image_url != self.image_url
                || !incoming.is_default)
        {
            return Err(Error::Protected(format!(
                "built-in background '{}' cannot be modified",
                self.name
            )));
        }
        Ok(())
    }

    fn seed_defaults(owner_id: &str) -> Vec<Self> {
        let seeds = [
            (0x00B1, "Aurora", "https://assets.haven.app/backgrounds/aurora.jpg"),
            (0x00B2, "Dunes", "https://assets.haven.app/backgrounds/dunes.jpg"),
            (0x00B3, "Harbor", "https://assets.haven.app/backgrounds/harbor.jpg"),
        ];
        seeds
            .into_iter()
            .map(|(raw_id, name, url)| {
                let mut meta = SyncMeta::new();
                meta.mark_synced();
                Self {
                    id: EntityId::from_u128(raw_id),
                    name: name.to_string(),
                    image_url: url.to_string(),
                    thumbnail_url: None,
                    category: FEATURED_CATEGORY.to_string(),
                    is_default: true,
                    owner_id: owner_id.to_string(),
                    meta,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStatus;

    #[test]
    fn test_seed_defaults_are_protected_and_synced() {
        let seeds = Background::seed_defaults("user-1");
        assert_eq!(seeds.len(), 3);
        for seed in &seeds {
            assert!(seed.is_protected());
            assert_eq!(seed.meta.sync_status, SyncStatus::Synced);
            assert_eq!(seed.category, FEATURED_CATEGORY);
        }
    }

    #[test]
    fn test_guard_update_rejects_image_swap_on_default() {
        let seed = Background::seed_defaults("user-1").remove(0);
        let mut hijacked = seed.clone();
        hijacked.image_url = "https://evil.example/bg.jpg".to_string();
        assert!(matches!(
            seed.guard_update(&hijacked),
            Err(Error::Protected(_))
        ));
    }

    #[test]
    fn test_guard_update_allows_custom_background_edits() {
        let custom = Background::new("Mine", "https://example.com/a.jpg", "user-1");
        let mut renamed = custom.clone();
        renamed.name = "Still mine".to_string();
        assert!(custom.guard_update(&renamed).is_ok());
    }
}
