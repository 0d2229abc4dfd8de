//! Durable operation queue.
//!
//! Offline mutations are appended here and persisted under a single kv key
//! before any network attempt, so a crash between the optimistic local write
//! and transmission loses nothing. Draining is non-reentrant: a drain
//! requested while another is in flight is a no-op, and the in-flight drain's
//! trailing reschedule picks up anything new.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use super::connectivity::Connectivity;
use super::remote::{BulkSyncRequest, RemoteApi};
use crate::db::LocalStore;
use crate::error::Result;
use crate::identity::IdentityStore;
use crate::models::{OperationKind, SyncOperation};

/// kv key the serialized queue lives under
const QUEUE_KEY: &str = "sync_queue";

/// Attempts before an operation is dropped and its record flagged
const MAX_RETRIES: u32 = 3;

const BASE_RETRY_DELAY_MS: u64 = 1_000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Ordered log of pending mutations awaiting transmission
pub struct SyncQueue {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteApi>,
    connectivity: Connectivity,
    identities: IdentityStore,
    operations: Mutex<Vec<SyncOperation>>,
    is_processing: AtomicBool,
    failed_drains: AtomicU32,
    /// Self-handle for fire-and-forget drains and reschedules
    me: Weak<Self>,
}

impl SyncQueue {
    /// Restore the queue from its persisted blob
    pub async fn load(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        connectivity: Connectivity,
        identities: IdentityStore,
    ) -> Result<Arc<Self>> {
        let operations = match store.kv_get(QUEUE_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(ops) => ops,
                Err(error) => {
                    tracing::warn!("discarding unreadable sync queue: {error}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if !operations.is_empty() {
            tracing::info!("restored {} pending sync operations", operations.len());
        }

        Ok(Arc::new_cyclic(|me| Self {
            store,
            remote,
            connectivity,
            identities,
            operations: Mutex::new(operations),
            is_processing: AtomicBool::new(false),
            failed_drains: AtomicU32::new(0),
            me: me.clone(),
        }))
    }

    /// Append a mutation and persist the full queue before returning.
    ///
    /// When connectivity is believed available, a drain is triggered
    /// fire-and-forget; the caller never blocks on network completion.
    pub async fn add_operation(&self, operation: SyncOperation) -> Result<()> {
        {
            let mut ops = self.operations.lock().await;
            tracing::debug!(
                "queueing {} {} for {}",
                operation.kind,
                operation.entity,
                operation.entity_id
            );
            ops.push(operation);
            self.persist(&ops).await?;
        }

        if self.connectivity.is_online() {
            self.spawn_drain();
        }
        Ok(())
    }

    fn spawn_drain(&self) {
        let Some(queue) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(error) = queue.process_queue().await {
                tracing::warn!("queue drain failed: {error}");
            }
        });
    }

    /// Drain the queue. At most one drain runs at a time; a request made
    /// while one is in flight is dropped.
    pub async fn process_queue(&self) -> Result<()> {
        if self.is_processing.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain already in flight, skipping");
            return Ok(());
        }

        let result = self.drain().await;
        self.is_processing.store(false, Ordering::SeqCst);

        let pending = self.operations.lock().await.len();
        if pending == 0 {
            self.failed_drains.store(0, Ordering::SeqCst);
        } else if self.connectivity.is_online() {
            self.schedule_retry();
        }

        result
    }

    /// Read-only snapshot for diagnostics
    pub async fn snapshot(&self) -> Vec<SyncOperation> {
        self.operations.lock().await.clone()
    }

    /// Discard all pending operations unconditionally (identity logout)
    pub async fn clear(&self) -> Result<()> {
        let mut ops = self.operations.lock().await;
        if !ops.is_empty() {
            tracing::info!("clearing {} pending sync operations", ops.len());
        }
        ops.clear();
        self.persist(&ops).await
    }

    async fn drain(&self) -> Result<()> {
        // Operations queued under an identity that no longer exists must not
        // be replayed under a different one.
        if self.identities.current().await?.is_none() {
            let mut ops = self.operations.lock().await;
            if !ops.is_empty() {
                tracing::warn!(
                    "discarding {} queued operations with no active identity",
                    ops.len()
                );
                ops.clear();
                self.persist(&ops).await?;
            }
            return Ok(());
        }

        if !self.connectivity.is_online() {
            return Ok(());
        }

        let mut snapshot = self.operations.lock().await.clone();
        match snapshot.len() {
            0 => Ok(()),
            1 => self.drain_single(snapshot.remove(0)).await,
            _ => self.drain_bulk(&snapshot).await,
        }
    }

    async fn drain_single(&self, operation: SyncOperation) -> Result<()> {
        let outcome = self.dispatch(&operation).await;

        let mut dropped = Vec::new();
        let mut confirmed = None;
        {
            let mut ops = self.operations.lock().await;
            match outcome {
                Ok(()) => {
                    ops.retain(|op| op.id != operation.id);
                    if operation.kind != OperationKind::Delete {
                        confirmed = Some(operation.clone());
                    }
                }
                Err(error) => {
                    tracing::debug!(
                        "{} {} for {} failed: {error}",
                        operation.kind,
                        operation.entity,
                        operation.entity_id
                    );
                    if let Some(op) = ops.iter_mut().find(|op| op.id == operation.id) {
                        op.retries += 1;
                        if op.retries >= MAX_RETRIES {
                            dropped.push(op.clone());
                        }
                    }
                    ops.retain(|op| op.retries < MAX_RETRIES);
                }
            }
            self.persist(&ops).await?;
        }

        if let Some(op) = confirmed {
            self.store
                .confirm_synced(op.entity, &op.entity_id, op.version)
                .await?;
        }
        for op in &dropped {
            self.surface_drop(op).await;
        }
        Ok(())
    }

    async fn drain_bulk(&self, snapshot: &[SyncOperation]) -> Result<()> {
        let request = BulkSyncRequest::from_operations(snapshot);
        let response = match self.remote.sync_bulk(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!("bulk sync of {} operations failed: {error}", snapshot.len());
                return Ok(());
            }
        };

        // A wholesale rejection with no conflict list is indistinguishable
        // from a transport failure; leave the queue for the next attempt.
        if !response.success && response.conflicts.is_empty() {
            tracing::debug!("bulk sync rejected without conflict detail");
            return Ok(());
        }

        let sent: HashSet<_> = snapshot.iter().map(|op| op.id).collect();
        let conflicted: HashSet<_> = response
            .conflicts
            .iter()
            .map(|conflict| conflict.client_id)
            .collect();

        let mut accepted = Vec::new();
        let mut dropped = Vec::new();
        {
            let mut ops = self.operations.lock().await;
            let mut retained = Vec::with_capacity(ops.len());
            for op in ops.drain(..) {
                if !sent.contains(&op.id) {
                    // Enqueued mid-drain; the trailing reschedule handles it
                    retained.push(op);
                } else if conflicted.contains(&op.id) {
                    let mut op = op;
                    op.retries += 1;
                    if op.retries >= MAX_RETRIES {
                        dropped.push(op);
                    } else {
                        retained.push(op);
                    }
                } else {
                    // Not reported as conflicting: presumed accepted
                    accepted.push(op);
                }
            }
            *ops = retained;
            self.persist(&ops).await?;
        }

        tracing::debug!(
            "bulk sync: {} accepted, {} conflicting, {} dropped",
            accepted.len(),
            conflicted.len(),
            dropped.len()
        );

        for op in &accepted {
            if op.kind != OperationKind::Delete {
                self.store
                    .confirm_synced(op.entity, &op.entity_id, op.version)
                    .await?;
            }
        }
        for op in &dropped {
            self.surface_drop(op).await;
        }
        Ok(())
    }

    async fn dispatch(&self, operation: &SyncOperation) -> Result<()> {
        match operation.kind {
            OperationKind::Create => {
                self.remote.create(operation.entity, &operation.data).await?;
            }
            OperationKind::Update => {
                self.remote
                    .update(operation.entity, &operation.entity_id, &operation.data)
                    .await?;
            }
            OperationKind::Delete => {
                self.remote
                    .delete(operation.entity, &operation.entity_id)
                    .await?;
            }
        }
        Ok(())
    }

    /// An operation hit the retry ceiling: drop it and leave a visible trail
    /// on the record it targeted.
    async fn surface_drop(&self, operation: &SyncOperation) {
        tracing::warn!(
            "dropping {} {} for {} after {} attempts",
            operation.kind,
            operation.entity,
            operation.entity_id,
            operation.retries
        );
        if operation.kind == OperationKind::Delete {
            return;
        }
        let message = format!("sync failed after {MAX_RETRIES} attempts");
        if let Err(error) = self
            .store
            .mark_error(operation.entity, &operation.entity_id, &message)
            .await
        {
            tracing::warn!(
                "failed to record sync error for {}: {error}",
                operation.entity_id
            );
        }
    }

    /// Re-attempt after a bounded delay: doubling backoff, capped, with
    /// jitter so many clients recovering from one outage don't retry in
    /// lockstep.
    fn schedule_retry(&self) {
        let Some(queue) = self.me.upgrade() else {
            return;
        };
        let failures = self.failed_drains.fetch_add(1, Ordering::SeqCst).min(5);
        let base = BASE_RETRY_DELAY_MS
            .saturating_mul(1 << failures)
            .min(MAX_RETRY_DELAY_MS);
        let jitter = rand::thread_rng().gen_range(0..=base / 4);
        let delay = Duration::from_millis(base + jitter);
        tracing::debug!("rescheduling drain in {delay:?}");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) = queue.process_queue().await {
                tracing::warn!("rescheduled drain failed: {error}");
            }
        });
    }

    async fn persist(&self, operations: &[SyncOperation]) -> Result<()> {
        let raw = serde_json::to_string(operations)?;
        self.store.kv_set(QUEUE_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;
    use crate::identity::Identity;
    use crate::models::{EntityId, EntityKind, SyncStatus, Task};
    use crate::sync::testing::MockRemote;

    struct Harness {
        store: Arc<LocalStore>,
        remote: Arc<MockRemote>,
        connectivity: Connectivity,
        identities: IdentityStore,
        queue: Arc<SyncQueue>,
    }

    async fn setup(remote: MockRemote) -> Harness {
        let store = Arc::new(LocalStore::new(Database::open_in_memory().await.unwrap()));
        let remote = Arc::new(remote);
        let connectivity = Connectivity::new();
        let identities = IdentityStore::new(Arc::clone(&store));
        identities.save(&Identity::account("user-1")).await.unwrap();

        let queue = SyncQueue::load(
            Arc::clone(&store),
            Arc::clone(&remote) as Arc<dyn RemoteApi>,
            connectivity.clone(),
            identities.clone(),
        )
        .await
        .unwrap();

        Harness {
            store,
            remote,
            connectivity,
            identities,
            queue,
        }
    }

    fn task_op(task: &Task, kind: OperationKind) -> SyncOperation {
        SyncOperation::new(
            kind,
            EntityKind::Task,
            task.id,
            serde_json::to_value(task).unwrap(),
            task.meta.version,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_operations_persist_before_any_network_attempt() {
        let h = setup(MockRemote::default()).await;
        let task = Task::new(EntityId::new(), "Offline work", "user-1");
        h.queue
            .add_operation(task_op(&task, OperationKind::Create))
            .await
            .unwrap();

        assert_eq!(h.remote.call_count(), 0);

        // A queue reloaded from the same store sees the operation
        let reloaded = SyncQueue::load(
            Arc::clone(&h.store),
            Arc::clone(&h.remote) as Arc<dyn RemoteApi>,
            h.connectivity.clone(),
            h.identities.clone(),
        )
        .await
        .unwrap();
        assert_eq!(reloaded.snapshot().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_path_success_confirms_and_removes() {
        let h = setup(MockRemote::default()).await;
        let task = Task::new(EntityId::new(), "One op", "user-1");
        h.store.put(&task).await.unwrap();
        h.queue
            .add_operation(task_op(&task, OperationKind::Create))
            .await
            .unwrap();

        h.connectivity.set_online(true);
        h.queue.process_queue().await.unwrap();

        assert!(h.queue.snapshot().await.is_empty());
        assert_eq!(h.remote.call_count(), 1);
        let synced: Task = h.store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(synced.meta.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_retry_ceiling_drops_on_third_failure_and_flags_record() {
        let remote = MockRemote::default();
        remote.fail_requests.store(true, Ordering::SeqCst);
        let h = setup(remote).await;

        let task = Task::new(EntityId::new(), "Doomed", "user-1");
        h.store.put(&task).await.unwrap();
        h.queue
            .add_operation(task_op(&task, OperationKind::Update))
            .await
            .unwrap();
        h.connectivity.set_online(true);

        for expected_retries in 1..=2 {
            h.queue.process_queue().await.unwrap();
            let ops = h.queue.snapshot().await;
            assert_eq!(ops.len(), 1);
            assert_eq!(ops[0].retries, expected_retries);
        }

        // Third failure removes the operation and surfaces the error
        h.queue.process_queue().await.unwrap();
        assert!(h.queue.snapshot().await.is_empty());
        let flagged: Task = h.store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(flagged.meta.sync_status, SyncStatus::Error);
        assert!(flagged
            .meta
            .error_message
            .as_deref()
            .unwrap()
            .contains("3 attempts"));

        // A fourth drain has nothing to send
        let calls_after_drop = h.remote.call_count();
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.remote.call_count(), calls_after_drop);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_identity_discards_queue_without_network() {
        let h = setup(MockRemote::default()).await;
        for i in 0..3 {
            let task = Task::new(EntityId::new(), format!("Task {i}"), "user-1");
            h.queue
                .add_operation(task_op(&task, OperationKind::Create))
                .await
                .unwrap();
        }
        assert_eq!(h.queue.snapshot().await.len(), 3);

        h.identities.clear().await.unwrap();
        h.connectivity.set_online(true);
        h.queue.process_queue().await.unwrap();

        assert!(h.queue.snapshot().await.is_empty());
        assert_eq!(h.remote.call_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_discards_everything() {
        let h = setup(MockRemote::default()).await;
        for i in 0..3 {
            let task = Task::new(EntityId::new(), format!("Task {i}"), "user-1");
            h.queue
                .add_operation(task_op(&task, OperationKind::Create))
                .await
                .unwrap();
        }

        h.queue.clear().await.unwrap();
        assert!(h.queue.snapshot().await.is_empty());
        assert_eq!(h.remote.call_count(), 0);

        // Cleared state is durable
        let reloaded = SyncQueue::load(
            Arc::clone(&h.store),
            Arc::clone(&h.remote) as Arc<dyn RemoteApi>,
            h.connectivity.clone(),
            h.identities.clone(),
        )
        .await
        .unwrap();
        assert!(reloaded.snapshot().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_drain_is_a_noop() {
        let h = setup(MockRemote::default()).await;
        let task = Task::new(EntityId::new(), "Waiting", "user-1");
        h.queue
            .add_operation(task_op(&task, OperationKind::Create))
            .await
            .unwrap();

        h.queue.process_queue().await.unwrap();
        assert_eq!(h.queue.snapshot().await.len(), 1);
        assert_eq!(h.remote.call_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bulk_success_confirms_all_and_clears() {
        let h = setup(MockRemote::default()).await;
        let list_id = EntityId::new();
        let mut tasks = Vec::new();
        for i in 0..3 {
            let task = Task::new(list_id, format!("Task {i}"), "user-1");
            h.store.put(&task).await.unwrap();
            h.queue
                .add_operation(task_op(&task, OperationKind::Create))
                .await
                .unwrap();
            tasks.push(task);
        }

        h.connectivity.set_online(true);
        h.queue.process_queue().await.unwrap();

        assert!(h.queue.snapshot().await.is_empty());
        assert_eq!(h.remote.call_count(), 1); // one bulk round trip
        for task in &tasks {
            let synced: Task = h.store.get(&task.id).await.unwrap().unwrap();
            assert_eq!(synced.meta.sync_status, SyncStatus::Synced);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bulk_conflicts_retain_only_conflicting_operations() {
        let h = setup(MockRemote::default()).await;
        let list_id = EntityId::new();
        let mut ops = Vec::new();
        for i in 0..3 {
            let task = Task::new(list_id, format!("Task {i}"), "user-1");
            h.store.put(&task).await.unwrap();
            let op = task_op(&task, OperationKind::Create);
            ops.push(op.clone());
            h.queue.add_operation(op).await.unwrap();
        }

        h.remote.conflict_ids.lock().unwrap().insert(ops[1].id);
        h.connectivity.set_online(true);
        h.queue.process_queue().await.unwrap();

        let remaining = h.queue.snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, ops[1].id);
        assert_eq!(remaining[0].retries, 1);

        // Non-conflicting operations were presumed accepted
        let accepted: Task = h.store.get(&ops[0].entity_id).await.unwrap().unwrap();
        assert_eq!(accepted.meta.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bulk_transport_failure_leaves_queue_untouched() {
        let remote = MockRemote::default();
        remote.fail_requests.store(true, Ordering::SeqCst);
        let h = setup(remote).await;

        for i in 0..2 {
            let task = Task::new(EntityId::new(), format!("Task {i}"), "user-1");
            h.queue
                .add_operation(task_op(&task, OperationKind::Create))
                .await
                .unwrap();
        }

        h.connectivity.set_online(true);
        h.queue.process_queue().await.unwrap();

        let ops = h.queue.snapshot().await;
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.retries == 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_drain_requests_collapse_to_one() {
        let remote = MockRemote {
            bulk_delay: Some(Duration::from_millis(100)),
            ..MockRemote::default()
        };
        let h = setup(remote).await;
        for i in 0..2 {
            let task = Task::new(EntityId::new(), format!("Task {i}"), "user-1");
            h.queue
                .add_operation(task_op(&task, OperationKind::Create))
                .await
                .unwrap();
        }
        h.connectivity.set_online(true);

        let first = {
            let queue = Arc::clone(&h.queue);
            tokio::spawn(async move { queue.process_queue().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Second request while the first is mid-flight: dropped, not queued
        h.queue.process_queue().await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(h.remote.call_count(), 1);
        assert!(h.queue.snapshot().await.is_empty());
    }
}
