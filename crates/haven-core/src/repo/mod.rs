//! Per-entity-type repositories.
//!
//! A repository composes the local store, the sync queue, and the remote
//! client into create/update/delete/query operations with offline fallback:
//! every mutation lands locally first, then either gets confirmed by an
//! immediate remote call or becomes a queued operation. Repositories are
//! constructed explicitly and injected into consumers; there is no ambient
//! global instance.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::identity::IdentityStore;
use crate::models::{EntityId, OperationKind, SyncOperation, SyncedRecord};
use crate::sync::{resolve, Connectivity, RemoteApi, SyncQueue, Winner};

pub struct EntityRepository<E: SyncedRecord> {
    store: Arc<LocalStore>,
    queue: Arc<SyncQueue>,
    remote: Arc<dyn RemoteApi>,
    connectivity: Connectivity,
    identities: IdentityStore,
    initialized: AtomicBool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: SyncedRecord> EntityRepository<E> {
    #[must_use]
    pub fn new(
        store: Arc<LocalStore>,
        queue: Arc<SyncQueue>,
        remote: Arc<dyn RemoteApi>,
        connectivity: Connectivity,
        identities: IdentityStore,
    ) -> Self {
        Self {
            store,
            queue,
            remote,
            connectivity,
            identities,
            initialized: AtomicBool::new(false),
            _entity: PhantomData,
        }
    }

    /// Lazy one-time bootstrap: seed built-in defaults into an empty store,
    /// and when online merge the canonical remote list. Idempotent; runs at
    /// most once per repository instance until [`Self::reset_to_defaults`].
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.store.count::<E>().await? == 0 {
            let owner = self.current_owner().await?;
            for seed in E::seed_defaults(&owner) {
                self.store.put(&seed).await?;
            }
        }

        if self.connectivity.is_online() {
            self.merge_remote_canonical().await?;
        }
        Ok(())
    }

    /// Create a record: optimistic local write, then an immediate remote
    /// attempt when online, falling back to the queue.
    pub async fn create(&self, record: E) -> Result<E> {
        self.store.put(&record).await?;

        if self.connectivity.is_online() {
            if let Some(confirmed) = self.try_remote_create(&record).await? {
                return Ok(confirmed);
            }
        }

        self.enqueue(OperationKind::Create, &record).await?;
        Ok(record)
    }

    /// Update a record in place via `mutate`.
    ///
    /// A missing record is a synchronous precondition failure and is never
    /// queued. Protected-record immutability is enforced before any write.
    pub async fn update<F>(&self, id: &EntityId, mutate: F) -> Result<E>
    where
        F: FnOnce(&mut E),
    {
        let current = self
            .store
            .get::<E>(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let mut updated = current.clone();
        mutate(&mut updated);
        current.guard_update(&updated)?;

        updated.meta_mut().touch();
        self.store.put(&updated).await?;

        if self.connectivity.is_online() {
            if let Some(confirmed) = self.try_remote_update(&updated).await? {
                return Ok(confirmed);
            }
        }

        self.enqueue(OperationKind::Update, &updated).await?;
        Ok(updated)
    }

    /// Delete a record. Missing or protected records fail synchronously
    /// before any local mutation or queue insertion.
    pub async fn delete(&self, id: &EntityId) -> Result<()> {
        let existing = self
            .store
            .get::<E>(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if existing.is_protected() {
            return Err(Error::Protected(id.to_string()));
        }

        self.store.delete::<E>(id).await?;

        if self.connectivity.is_online() {
            match self.remote.delete(E::KIND, id).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::debug!("remote delete of {} {id} failed, queueing: {error}", E::KIND);
                }
            }
        }

        self.enqueue(OperationKind::Delete, &existing).await
    }

    /// Point lookup; never touches network or queue
    pub async fn get_by_id(&self, id: &EntityId) -> Result<Option<E>> {
        self.store.get(id).await
    }

    /// All records, most recently updated first; never touches network
    pub async fn get_all(&self) -> Result<Vec<E>> {
        self.store.all().await
    }

    /// Records owned by an identity; never touches network
    pub async fn get_by_user(&self, owner_id: &str) -> Result<Vec<E>> {
        self.store.by_owner(owner_id).await
    }

    /// Records in a category; never touches network
    pub async fn get_by_category(&self, category: &str) -> Result<Vec<E>> {
        self.store.by_category(category).await
    }

    /// Explicit manual reconciliation: drain the queue, then re-merge the
    /// canonical remote list.
    pub async fn sync(&self) -> Result<()> {
        self.queue.process_queue().await?;
        if self.connectivity.is_online() {
            self.merge_remote_canonical().await?;
        }
        Ok(())
    }

    /// Delete all non-protected records, restore the seed defaults, and arm
    /// the next [`Self::initialize`] call to run the full bootstrap again.
    pub async fn reset_to_defaults(&self) -> Result<()> {
        for record in self.store.all::<E>().await? {
            if !record.is_protected() {
                self.store.delete::<E>(&record.entity_id()).await?;
            }
        }

        let owner = self.current_owner().await?;
        for seed in E::seed_defaults(&owner) {
            if self.store.get::<E>(&seed.entity_id()).await?.is_none() {
                self.store.put(&seed).await?;
            }
        }

        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn current_owner(&self) -> Result<String> {
        Ok(self
            .identities
            .current()
            .await?
            .map(|identity| identity.user_id)
            .unwrap_or_default())
    }

    async fn try_remote_create(&self, record: &E) -> Result<Option<E>> {
        let payload = serde_json::to_value(record)?;
        match self.remote.create(E::KIND, &payload).await {
            Ok(returned) => self.absorb_confirmed(returned).await,
            Err(error) => {
                tracing::debug!("remote create for {} failed, queueing: {error}", E::KIND);
                Ok(None)
            }
        }
    }

    async fn try_remote_update(&self, record: &E) -> Result<Option<E>> {
        let payload = serde_json::to_value(record)?;
        match self
            .remote
            .update(E::KIND, &record.entity_id(), &payload)
            .await
        {
            Ok(returned) => self.absorb_confirmed(returned).await,
            Err(error) => {
                tracing::debug!("remote update for {} failed, queueing: {error}", E::KIND);
                Ok(None)
            }
        }
    }

    /// The server's returned record is authoritative: it overwrites the
    /// optimistic local copy and is marked synced.
    async fn absorb_confirmed(&self, returned: serde_json::Value) -> Result<Option<E>> {
        match serde_json::from_value::<E>(returned) {
            Ok(mut confirmed) => {
                confirmed.meta_mut().mark_synced();
                self.store.put(&confirmed).await?;
                Ok(Some(confirmed))
            }
            Err(error) => {
                tracing::warn!("unparseable {} response, queueing instead: {error}", E::KIND);
                Ok(None)
            }
        }
    }

    async fn enqueue(&self, kind: OperationKind, record: &E) -> Result<()> {
        let operation = SyncOperation::new(
            kind,
            E::KIND,
            record.entity_id(),
            serde_json::to_value(record)?,
            record.meta().version,
        );
        self.queue.add_operation(operation).await
    }

    async fn merge_remote_canonical(&self) -> Result<()> {
        let payloads = match self.remote.fetch_all(E::KIND).await {
            Ok(payloads) => payloads,
            Err(error) => {
                tracing::debug!("canonical fetch for {} failed: {error}", E::KIND);
                return Ok(());
            }
        };

        for payload in payloads {
            let remote_record: E = match serde_json::from_value(payload) {
                Ok(record) => record,
                Err(error) => {
                    tracing::warn!("skipping malformed {} record: {error}", E::KIND);
                    continue;
                }
            };

            match self.store.get::<E>(&remote_record.entity_id()).await? {
                None => {
                    let mut record = remote_record;
                    record.meta_mut().mark_synced();
                    self.store.put(&record).await?;
                }
                Some(local) => {
                    let resolved = resolve(local, remote_record);
                    let mut record = resolved.record;
                    if resolved.winner == Winner::Remote {
                        record.meta_mut().mark_synced();
                    }
                    self.store.put(&record).await?;
                }
            }
        }
        Ok(())
    }
}
