//! Shared in-memory remote for engine tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::remote::{BulkConflict, BulkSyncRequest, BulkSyncResponse, RemoteApi};
use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind, OperationId};

/// Scriptable [`RemoteApi`] double: records every call, can fail on demand,
/// report bulk conflicts for chosen client ids, serve canonical payloads,
/// and stall bulk requests to exercise the drain guard.
#[derive(Default)]
pub struct MockRemote {
    pub calls: Mutex<Vec<String>>,
    pub fail_requests: AtomicBool,
    pub conflict_ids: Mutex<HashSet<OperationId>>,
    pub fetch_payloads: Mutex<Vec<serde_json::Value>>,
    pub created: Mutex<Vec<serde_json::Value>>,
    pub bulk_delay: Option<Duration>,
}

impl MockRemote {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn failing(&self) -> bool {
        self.fail_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>> {
        self.record(format!("fetch_all:{kind}"));
        if self.failing() {
            return Err(Error::Api("mock failure".to_string()));
        }
        Ok(self.fetch_payloads.lock().unwrap().clone())
    }

    async fn create(
        &self,
        kind: EntityKind,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.record(format!("create:{kind}"));
        if self.failing() {
            return Err(Error::Api("mock failure".to_string()));
        }
        self.created.lock().unwrap().push(data.clone());
        Ok(data.clone())
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.record(format!("update:{kind}:{id}"));
        if self.failing() {
            return Err(Error::Api("mock failure".to_string()));
        }
        Ok(data.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        self.record(format!("delete:{kind}:{id}"));
        if self.failing() {
            return Err(Error::Api("mock failure".to_string()));
        }
        Ok(())
    }

    async fn sync_bulk(&self, request: &BulkSyncRequest) -> Result<BulkSyncResponse> {
        self.record("bulk");
        if let Some(delay) = self.bulk_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing() {
            return Err(Error::Api("mock failure".to_string()));
        }
        let known: HashSet<_> = request
            .operations
            .iter()
            .map(|change| change.client_id)
            .collect();
        let conflicts = self
            .conflict_ids
            .lock()
            .unwrap()
            .iter()
            .filter(|id| known.contains(id))
            .map(|id| BulkConflict { client_id: *id })
            .collect::<Vec<_>>();
        Ok(BulkSyncResponse {
            success: conflicts.is_empty(),
            conflicts,
        })
    }
}
