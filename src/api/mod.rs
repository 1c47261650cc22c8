//! HTTP surface over a [`MemoryStore`].
//!
//! Every handler creates a cancellation token that fires when the handler
//! future is dropped (the client went away), so in-flight batches stop
//! starting new engine calls.

pub mod collections;
pub mod records;
pub mod search;

use crate::domain::BatchItem;
use crate::error::{ErrorKind, MemoryStoreError};
use crate::store::MemoryStore;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Clone, Debug)]
pub struct ApiState {
    pub store: Arc<dyn MemoryStore>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/collections", get(collections::list_collections))
        .route(
            "/collections/{name}",
            get(collections::collection_exists)
                .post(collections::create_collection)
                .delete(collections::delete_collection),
        )
        .route("/collections/{name}/records", put(records::upsert_record))
        .route("/collections/{name}/records/batch/get", post(records::get_batch))
        .route("/collections/{name}/records/batch/upsert", post(records::upsert_batch))
        .route("/collections/{name}/records/batch/remove", post(records::remove_batch))
        .route(
            "/collections/{name}/records/{key}",
            get(records::get_record).delete(records::remove_record),
        )
        .route("/collections/{name}/search", post(search::nearest_matches))
        .route("/collections/{name}/search/nearest", post(search::nearest_match))
        .with_state(state)
}

/// Token for one request; cancelled when the returned guard is dropped.
pub(crate) fn request_cancellation() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&MemoryStoreError> for ErrorBody {
    fn from(err: &MemoryStoreError) -> Self {
        Self {
            error: err.kind().as_str(),
            message: err.to_string(),
        }
    }
}

/// Store error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MemoryStoreError);

impl From<MemoryStoreError> for ApiError {
    fn from(err: MemoryStoreError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match (&self.0, self.0.kind()) {
            (MemoryStoreError::Timeout(_), _) => StatusCode::GATEWAY_TIMEOUT,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::SchemaConflict) => StatusCode::CONFLICT,
            (_, ErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Transport | ErrorKind::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorKind::Codec) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, kind = self.0.kind().as_str(), "Request failed");
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

/// Per-key outcome of a batch write or remove.
#[derive(Debug, Serialize)]
pub struct AckItem {
    pub key: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> From<BatchItem<T>> for AckItem {
    fn from(item: BatchItem<T>) -> Self {
        Self {
            ok: item.is_ok(),
            error: item.error().map(ErrorBody::from),
            key: item.key,
        }
    }
}
