//! CLI error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] haven_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Task title cannot be empty")]
    EmptyTitle,
    #[error("No record matches id/prefix: {0}")]
    RecordNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("List '{0}' not found")]
    ListNotFound(String),
    #[error("Sync requires a server. Pass --server or set HAVEN_SERVER_URL.")]
    ServerRequired,
}
