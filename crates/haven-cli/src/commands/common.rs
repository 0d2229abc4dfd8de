//! Shared engine wiring and formatting helpers for CLI commands

use std::path::Path;
use std::sync::Arc;

use haven_core::db::{Database, LocalStore};
use haven_core::identity::{Identity, IdentityStore};
use haven_core::models::{Background, BlockRule, SyncStatus, SyncedRecord, Task, TaskList};
use haven_core::sync::{Connectivity, HttpRemoteClient, RemoteApi, SyncQueue};
use haven_core::{EntityId, EntityRepository};

use crate::error::CliError;

/// Placeholder base URL used while offline; the engine never calls it
/// because connectivity stays down without `--server`.
const OFFLINE_SERVER_URL: &str = "https://api.haven.invalid";

/// One-place wiring of the engine: store, queue, and the per-entity
/// repositories every command works through.
pub struct Engine {
    pub queue: Arc<SyncQueue>,
    pub connectivity: Connectivity,
    pub identities: IdentityStore,
    pub task_lists: EntityRepository<TaskList>,
    pub tasks: EntityRepository<Task>,
    pub backgrounds: EntityRepository<Background>,
    pub block_rules: EntityRepository<BlockRule>,
    server_configured: bool,
}

impl Engine {
    /// Whether a reachable server was configured
    pub const fn has_server(&self) -> bool {
        self.server_configured
    }
}

pub async fn open_engine(db_path: &Path, server: Option<&str>) -> Result<Engine, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::open(db_path).await?;
    let store = Arc::new(LocalStore::new(db));
    let identities = IdentityStore::new(Arc::clone(&store));

    let connectivity = if server.is_some() {
        Connectivity::online()
    } else {
        Connectivity::new()
    };
    let remote: Arc<dyn RemoteApi> =
        Arc::new(HttpRemoteClient::new(server.unwrap_or(OFFLINE_SERVER_URL))?);

    let queue = SyncQueue::load(
        Arc::clone(&store),
        Arc::clone(&remote),
        connectivity.clone(),
        identities.clone(),
    )
    .await?;

    let task_lists = EntityRepository::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&remote),
        connectivity.clone(),
        identities.clone(),
    );
    let tasks = EntityRepository::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&remote),
        connectivity.clone(),
        identities.clone(),
    );
    let backgrounds = EntityRepository::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&remote),
        connectivity.clone(),
        identities.clone(),
    );
    let block_rules = EntityRepository::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&remote),
        connectivity.clone(),
        identities.clone(),
    );

    Ok(Engine {
        queue,
        connectivity,
        identities,
        task_lists,
        tasks,
        backgrounds,
        block_rules,
        server_configured: server.is_some(),
    })
}

/// The active identity, creating a device-local guest when none exists
pub async fn ensure_identity(engine: &Engine) -> Result<Identity, CliError> {
    if let Some(identity) = engine.identities.current().await? {
        return Ok(identity);
    }
    let guest = Identity::guest();
    engine.identities.save(&guest).await?;
    tracing::debug!("created guest identity {}", guest.user_id);
    Ok(guest)
}

/// Resolve a full id or unique id prefix against a set of records
pub fn resolve_record_id<E: SyncedRecord>(
    records: &[E],
    query: &str,
) -> Result<EntityId, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::RecordNotFound(query.to_string()));
    }

    if let Ok(id) = query.parse::<EntityId>() {
        if records.iter().any(|record| record.entity_id() == id) {
            return Ok(id);
        }
    }

    let matches: Vec<EntityId> = records
        .iter()
        .map(SyncedRecord::entity_id)
        .filter(|id| id.as_str().starts_with(query))
        .collect();

    match matches.len() {
        0 => Err(CliError::RecordNotFound(query.to_string())),
        1 => Ok(matches[0]),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(short_id)
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// First 13 characters of an id, enough to stay unique in practice
pub fn short_id(id: &EntityId) -> String {
    id.as_str().chars().take(13).collect()
}

/// Single-character sync state marker for listings
pub const fn status_marker(status: SyncStatus) -> char {
    match status {
        SyncStatus::Synced => ' ',
        SyncStatus::Pending => '~',
        SyncStatus::Error => '!',
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
