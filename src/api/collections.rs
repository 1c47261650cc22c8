//! Collection lifecycle routes.

use super::{AckItem, ApiError, ApiState, request_cancellation};
use crate::domain::CascadeReport;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use futures::TryStreamExt;
use serde::Serialize;

// =============================================================================
// Response DTOs
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CollectionListResponse {
    pub collections: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub name: String,
    pub exists: bool,
}

#[derive(Debug, Serialize)]
pub struct CascadeResponse {
    pub collection: String,
    pub documents_removed: usize,
    pub complete: bool,
    pub failures: Vec<AckItem>,
}

impl From<CascadeReport> for CascadeResponse {
    fn from(report: CascadeReport) -> Self {
        Self {
            complete: report.is_complete(),
            collection: report.collection,
            documents_removed: report.documents_removed,
            failures: report.failures.into_iter().map(AckItem::from).collect(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /collections
pub async fn list_collections(State(state): State<ApiState>) -> Result<Json<CollectionListResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let collections = state.store.list_collections(cancel).try_collect().await?;
    Ok(Json(CollectionListResponse { collections }))
}

/// GET /collections/{name}
pub async fn collection_exists(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let exists = state.store.collection_exists(&name, &cancel).await?;
    Ok(Json(CollectionResponse { name, exists }))
}

/// POST /collections/{name}
pub async fn create_collection(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<CollectionResponse>), ApiError> {
    let (cancel, _guard) = request_cancellation();
    state.store.create_collection(&name, &cancel).await?;
    Ok((StatusCode::CREATED, Json(CollectionResponse { name, exists: true })))
}

/// DELETE /collections/{name}
pub async fn delete_collection(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<CascadeResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let report = state.store.delete_collection(&name, &cancel).await?;
    Ok(Json(report.into()))
}
