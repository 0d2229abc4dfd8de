//! Task list and task models

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, EntityKind, SyncMeta, SyncedRecord};
use crate::error::{Error, Result};

/// Fixed id for the built-in Inbox list, stable across reinstalls
const INBOX_LIST_ID: EntityId = EntityId::from_u128(0x0001);

/// A named collection of tasks. Deleting a list deletes its tasks atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub owner_id: String,
    /// Built-in lists cannot be deleted or renamed
    #[serde(default)]
    pub is_default: bool,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

impl TaskList {
    #[must_use]
    pub fn new(name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            color: None,
            owner_id: owner_id.into(),
            is_default: false,
            meta: SyncMeta::new(),
        }
    }
}

impl SyncedRecord for TaskList {
    const KIND: EntityKind = EntityKind::TaskList;

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

    fn is_protected(&self) -> bool {
        self.is_default
    }

    fn guard_update(&self, incoming: &Self) -> Result<()> {
        if self.is_default && (incoming.name != self.name || !incoming.is_default) {
            return Err(Error::Protected(format!(
                "default list '{}' cannot be renamed",
                self.name
            )));
        }
        Ok(())
    }

    fn seed_defaults(owner_id: &str) -> Vec<Self> {
        let mut meta = SyncMeta::new();
        meta.mark_synced();
        vec![Self {
            id: INBOX_LIST_ID,
            name: "Inbox".to_string(),
            color: None,
            owner_id: owner_id.to_string(),
            is_default: true,
            meta,
        }]
    }
}

/// A single to-do item belonging to a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub list_id: EntityId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Due timestamp (unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    pub owner_id: String,
    #[serde(flatten)]
    pub meta: SyncMeta,
}

impl Task {
    #[must_use]
    pub fn new(
        list_id: EntityId,
        title: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            list_id,
            title: title.into(),
            notes: None,
            category: None,
            due_at: None,
            completed: false,
            owner_id: owner_id.into(),
            meta: SyncMeta::new(),
        }
    }

    /// Check if the task is overdue relative to `now_ms`
    #[must_use]
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        !self.completed && self.due_at.is_some_and(|due| due < now_ms)
    }
}

impl SyncedRecord for Task {
    const KIND: EntityKind = EntityKind::Task;

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
        self.category.as_deref()
    }

    fn due_at(&self) -> Option<i64> {
        self.due_at
    }

    fn parent_id(&self) -> Option<EntityId> {
        Some(self.list_id)
    }
}
