//! Record routes: point reads and writes plus their batched forms.

use super::{AckItem, ApiError, ApiState, ErrorBody, request_cancellation};
use crate::domain::{BatchItem, MemoryRecord};
use crate::error::{MemoryStoreError, ResourceKind};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

// =============================================================================
// Request/Response DTOs
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct GetRecordQuery {
    #[serde(default)]
    pub with_embedding: bool,
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct GetBatchRequest {
    pub keys: Vec<String>,
    #[serde(default)]
    pub with_embeddings: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBatchRequest {
    pub records: Vec<MemoryRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveBatchRequest {
    pub keys: Vec<String>,
}

/// One key of a batch read. A miss is `found: false` without an error.
#[derive(Debug, Serialize)]
pub struct RecordItem {
    pub key: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<MemoryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<BatchItem<Option<MemoryRecord>>> for RecordItem {
    fn from(item: BatchItem<Option<MemoryRecord>>) -> Self {
        match item.outcome {
            Ok(record) => Self {
                key: item.key,
                found: record.is_some(),
                record,
                error: None,
            },
            Err(err) => Self {
                key: item.key,
                found: false,
                record: None,
                error: Some(ErrorBody::from(&err)),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse<T> {
    pub items: Vec<T>,
    pub failed: usize,
}

impl<T> BatchResponse<T> {
    fn new(items: Vec<T>, failed: usize) -> Self {
        Self { items, failed }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /collections/{name}/records/{key}
pub async fn get_record(
    State(state): State<ApiState>,
    Path((name, key)): Path<(String, String)>,
    Query(query): Query<GetRecordQuery>,
) -> Result<Json<MemoryRecord>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    state
        .store
        .get(&name, &key, query.with_embedding, &cancel)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError(MemoryStoreError::NotFound {
                kind: ResourceKind::Record,
                name: key,
            })
        })
}

/// PUT /collections/{name}/records
pub async fn upsert_record(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(record): Json<MemoryRecord>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let key = state.store.upsert(&name, record, &cancel).await?;
    Ok(Json(UpsertResponse { key }))
}

/// DELETE /collections/{name}/records/{key}
pub async fn remove_record(
    State(state): State<ApiState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (cancel, _guard) = request_cancellation();
    state.store.remove(&name, &key, &cancel).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /collections/{name}/records/batch/get
pub async fn get_batch(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<GetBatchRequest>,
) -> Json<BatchResponse<RecordItem>> {
    let (cancel, _guard) = request_cancellation();
    let items: Vec<RecordItem> = state
        .store
        .get_batch(&name, req.keys, req.with_embeddings, cancel)
        .map(RecordItem::from)
        .collect()
        .await;
    let failed = items.iter().filter(|item| item.error.is_some()).count();
    Json(BatchResponse::new(items, failed))
}

/// POST /collections/{name}/records/batch/upsert
pub async fn upsert_batch(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<UpsertBatchRequest>,
) -> Json<BatchResponse<AckItem>> {
    let (cancel, _guard) = request_cancellation();
    let items: Vec<AckItem> = state
        .store
        .upsert_batch(&name, req.records, cancel)
        .map(AckItem::from)
        .collect()
        .await;
    let failed = items.iter().filter(|item| !item.ok).count();
    Json(BatchResponse::new(items, failed))
}

/// POST /collections/{name}/records/batch/remove
pub async fn remove_batch(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<RemoveBatchRequest>,
) -> Json<BatchResponse<AckItem>> {
    let (cancel, _guard) = request_cancellation();
    let items: Vec<AckItem> = state
        .store
        .remove_batch(&name, req.keys, &cancel)
        .await
        .into_iter()
        .map(AckItem::from)
        .collect();
    let failed = items.iter().filter(|item| !item.ok).count();
    Json(BatchResponse::new(items, failed))
}
