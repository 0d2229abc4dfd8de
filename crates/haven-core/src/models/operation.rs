//! Durable sync queue entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::entity::{EntityId, EntityKind};

/// Queue-local identifier, distinct from the entity id. Echoed to the server
/// as `clientId` so conflict responses can be correlated back to the
/// originating mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the durable sync queue.
///
/// `data` is a snapshot of the record payload taken at enqueue time; later
/// local mutations never alter an already-queued snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub entity: EntityKind,
    pub entity_id: EntityId,
    pub data: serde_json::Value,
    /// Enqueue time (unix ms)
    pub timestamp: i64,
    /// Attempt counter, starts at 0
    pub retries: u32,
    /// Entity version this operation targets, for server-side optimistic
    /// concurrency checks
    pub version: i64,
}

impl SyncOperation {
    #[must_use]
    pub fn new(
        kind: OperationKind,
        entity: EntityKind,
        entity_id: EntityId,
        data: serde_json::Value,
        version: i64,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            entity,
            entity_id,
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            retries: 0,
            version,
        }
    }
}
