//! Remote authority API client.
//!
//! Most entity types use the generic REST pattern derived from the entity
//! type name (`POST /v1/<kebab>`, `PATCH /v1/<kebab>/<id>`,
//! `DELETE /v1/<kebab>/<id>`). Tasks are the exception: they go through the
//! dedicated task surface with enveloped responses. Bulk reconciliation is a
//! single `POST /v1/sync/bulk` round trip.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{EntityId, EntityKind, OperationId, OperationKind, SyncOperation};

/// One queued mutation as the server sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedChange {
    pub entity: EntityKind,
    pub operation: OperationKind,
    pub data: serde_json::Value,
    pub client_id: OperationId,
    pub timestamp: i64,
}

/// Bulk reconciliation request.
///
/// `last_sync_timestamp` is the minimum timestamp across the batch — a
/// conservative lower bound so the server misses no change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncRequest {
    pub operations: Vec<QueuedChange>,
    pub last_sync_timestamp: i64,
}

impl BulkSyncRequest {
    /// Serialize a batch of queued operations into one reconciliation request
    #[must_use]
    pub fn from_operations(operations: &[SyncOperation]) -> Self {
        let last_sync_timestamp = operations
            .iter()
            .map(|op| op.timestamp)
            .min()
            .unwrap_or_default();
        let operations = operations
            .iter()
            .map(|op| QueuedChange {
                entity: op.entity,
                operation: op.kind,
                data: op.data.clone(),
                client_id: op.id,
                timestamp: op.timestamp,
            })
            .collect();
        Self {
            operations,
            last_sync_timestamp,
        }
    }
}

/// A mutation the server could not apply cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConflict {
    pub client_id: OperationId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSyncResponse {
    pub success: bool,
    #[serde(default)]
    pub conflicts: Vec<BulkConflict>,
}

/// Calls against the remote authority. Object-safe so the queue and
/// repositories can share one injected client.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Canonical list of records of a kind
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>>;

    /// Create a record; returns the server's authoritative copy
    async fn create(&self, kind: EntityKind, data: &serde_json::Value)
        -> Result<serde_json::Value>;

    /// Update a record; returns the server's authoritative copy
    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value>;

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> Result<()>;

    /// Reconcile a whole batch of queued operations in one round trip
    async fn sync_bulk(&self, request: &BulkSyncRequest) -> Result<BulkSyncResponse>;
}

/// Enveloped response from the dedicated task surface
#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    success: bool,
    #[serde(default)]
    task: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of [`RemoteApi`]
#[derive(Clone)]
pub struct HttpRemoteClient {
    base_url: String,
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
            auth_token: None,
        })
    }

    /// Attach a bearer token to every request
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder.header("Accept", "application/json")
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/v1/{}", self.base_url, kind.api_path())
    }

    fn record_url(&self, kind: EntityKind, id: &EntityId) -> String {
        format!("{}/v1/{}/{}", self.base_url, kind.api_path(), id)
    }

    async fn task_call(
        &self,
        method: Method,
        url: String,
        data: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut builder = self.request(method, url);
        if let Some(data) = data {
            builder = builder.json(data);
        }
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }

        let envelope = response.json::<TaskEnvelope>().await?;
        if !envelope.success {
            return Err(Error::Api(
                envelope.error.unwrap_or_else(|| "task API rejected the request".to_string()),
            ));
        }
        Ok(envelope.task.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteClient {
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>> {
        let response = self
            .request(Method::GET, self.collection_url(kind))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json().await?)
    }

    async fn create(
        &self,
        kind: EntityKind,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        // Tasks are special-cased onto their own API surface
        if kind == EntityKind::Task {
            let url = format!("{}/v1/tasks", self.base_url);
            return self.task_call(Method::POST, url, Some(data)).await;
        }

        let response = self
            .request(Method::POST, self.collection_url(kind))
            .json(data)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json().await?)
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &EntityId,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        if kind == EntityKind::Task {
            let url = format!("{}/v1/tasks/{id}", self.base_url);
            return self.task_call(Method::PATCH, url, Some(data)).await;
        }

        let response = self
            .request(Method::PATCH, self.record_url(kind, id))
            .json(data)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json().await?)
    }

    async fn delete(&self, kind: EntityKind, id: &EntityId) -> Result<()> {
        if kind == EntityKind::Task {
            let url = format!("{}/v1/tasks/{id}", self.base_url);
            self.task_call(Method::DELETE, url, None).await?;
            return Ok(());
        }

        let response = self
            .request(Method::DELETE, self.record_url(kind, id))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(())
    }

    async fn sync_bulk(&self, request: &BulkSyncRequest) -> Result<BulkSyncResponse> {
        let url = format!("{}/v1/sync/bulk", self.base_url);
        let response = self
            .request(Method::POST, url)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "server base URL must not be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "server base URL must include http:// or https://".to_string(),
        ))
    }
}
