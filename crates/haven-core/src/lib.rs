//! haven-core - Local-first sync engine for Haven
//!
//! This crate contains the versioned data model, the durable local store,
//! the offline operation queue, the conflict resolver, and the per-entity
//! repositories used by all Haven interfaces. Mutations land locally first
//! and reconcile with the remote authority when connectivity allows.

pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod repo;
pub mod sync;

pub use error::{Error, Result};
pub use models::{EntityId, EntityKind, SyncMeta, SyncStatus, SyncedRecord};
pub use repo::EntityRepository;
