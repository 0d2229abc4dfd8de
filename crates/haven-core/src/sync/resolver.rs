//! Conflict resolution between divergent local and remote copies.
//!
//! The policy is whole-record resolution, never a field merge: a strictly
//! greater version wins in full regardless of recency, and equal versions
//! fall back to record-level last-writer-wins on `last_modified` (ties keep
//! the local copy). Versions are totally ordered integers, so exactly one of
//! those three comparisons applies.

use crate::models::SyncedRecord;

/// Which side supplied the winning record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Outcome of [`resolve`]: the winning record with its envelope normalized
#[derive(Debug)]
pub struct Resolved<E> {
    pub record: E,
    pub winner: Winner,
}

/// Decide which of two divergent copies of a record survives.
///
/// The winning record always carries `version = max(local, remote)` and
/// `last_modified = max(local, remote)`, whichever side its other fields
/// came from.
pub fn resolve<E: SyncedRecord>(local: E, remote: E) -> Resolved<E> {
    let local_version = local.meta().version;
    let remote_version = remote.meta().version;
    let local_modified = local.meta().last_modified;
    let remote_modified = remote.meta().last_modified;

    let winner = if local_version == remote_version {
        if remote_modified > local_modified {
            Winner::Remote
        } else {
            Winner::Local
        }
    } else if local_version > remote_version {
        Winner::Local
    } else {
        Winner::Remote
    };

    let mut record = match winner {
        Winner::Local => local,
        Winner::Remote => remote,
    };
    let meta = record.meta_mut();
    meta.version = local_version.max(remote_version);
    meta.last_modified = local_modified.max(remote_modified);

    Resolved { record, winner }
}
