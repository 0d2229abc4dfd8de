//! Synchronization layer: connectivity, conflict resolution, the remote API
//! client, and the durable operation queue

mod connectivity;
mod queue;
mod remote;
mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use connectivity::Connectivity;
pub use queue::SyncQueue;
pub use remote::{
    BulkConflict, BulkSyncRequest, BulkSyncResponse, HttpRemoteClient, QueuedChange, RemoteApi,
};
pub use resolver::{resolve, Resolved, Winner};
