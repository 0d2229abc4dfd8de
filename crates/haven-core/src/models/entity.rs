//! Versioned entity envelope shared by all synchronized records

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Result;

/// A unique identifier for a synchronized record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new unique entity ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Build an ID from a fixed value (used for built-in seed records)
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Synchronization state of a record relative to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local changes not yet confirmed by the server
    Pending,
    /// Local state matches the last confirmed server state
    Synced,
    /// Synchronization permanently failed for this record
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The versioned envelope embedded in every synchronized record.
///
/// `version` starts at 1 and is bumped exactly once per accepted local
/// mutation via [`SyncMeta::touch`]; it never decreases except when the whole
/// record is replaced by a server-authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// Monotonically increasing mutation counter, starts at 1
    pub version: i64,
    /// Synchronization state
    pub sync_status: SyncStatus,
    /// Wall-clock timestamp of the most recent local mutation (unix ms)
    pub last_modified: i64,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    /// Last update timestamp (unix ms)
    pub updated_at: i64,
    /// Last synchronization failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SyncMeta {
    /// Envelope for a freshly created record: version 1, pending
    #[must_use]
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            version: 1,
            sync_status: SyncStatus::Pending,
            last_modified: now,
            created_at: now,
            updated_at: now,
            error_message: None,
        }
    }

    /// Record an accepted local mutation: bump the version and fall back to
    /// pending until the server confirms this exact version.
    pub fn touch(&mut self) {
        let now = chrono::Utc::now().timestamp_millis();
        self.version += 1;
        self.sync_status = SyncStatus::Pending;
        self.last_modified = now;
        self.updated_at = now;
        self.error_message = None;
    }

    /// Mark the record as confirmed by the server
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Synced;
        self.error_message = None;
    }

    /// Mark the record as permanently failed with a reason
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.sync_status = SyncStatus::Error;
        self.error_message = Some(message.into());
    }
}

impl Default for SyncMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Logical entity type, used to route records to tables and endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    TaskList,
    Task,
    Background,
    BlockRule,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskList => "task-list",
            Self::Task => "task",
            Self::Background => "background",
            Self::BlockRule => "block-rule",
        }
    }

    /// URL segment for the generic REST pattern (`/v1/<api_path>`)
    #[must_use]
    pub const fn api_path(self) -> &'static str {
        match self {
            Self::TaskList => "task-lists",
            Self::Task => "tasks",
            Self::Background => "backgrounds",
            Self::BlockRule => "block-rules",
        }
    }

    /// Local store table holding records of this kind
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::TaskList => "task_lists",
            Self::Task => "tasks",
            Self::Background => "backgrounds",
            Self::BlockRule => "block_rules",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task-list" => Ok(Self::TaskList),
            "task" => Ok(Self::Task),
            "background" => Ok(Self::Background),
            "block-rule" => Ok(Self::BlockRule),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// A synchronized record carrying the [`SyncMeta`] envelope.
///
/// Implementors expose the indexed fields the local store queries on and the
/// protection hooks the repositories enforce before mutating.
pub trait SyncedRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Entity type this record belongs to
    const KIND: EntityKind;

    fn entity_id(&self) -> EntityId;

    fn meta(&self) -> &SyncMeta;

    fn meta_mut(&mut self) -> &mut SyncMeta;

    /// Owning identity, used for per-user queries
    fn owner_id(&self) -> &str;

    /// Optional category, indexed for filtered queries
    fn category(&self) -> Option<&str> {
        None
    }

    /// Optional due timestamp (unix ms), indexed for range queries
    fn due_at(&self) -> Option<i64> {
        None
    }

    /// Optional parent record (cascade deletes follow this edge)
    fn parent_id(&self) -> Option<EntityId> {
        None
    }

    /// Protected records refuse deletion and immutable-field updates
    fn is_protected(&self) -> bool {
        false
    }

    /// Reject updates that touch fields a protected record keeps immutable
    fn guard_update(&self, _incoming: &Self) -> Result<()> {
        Ok(())
    }

    /// Built-in records seeded on first initialization
    #[must_use]
    fn seed_defaults(_owner_id: &str) -> Vec<Self> {
        Vec::new()
    }
}
