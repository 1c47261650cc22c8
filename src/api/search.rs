//! Similarity search routes.

use super::{ApiError, ApiState, request_cancellation};
use crate::domain::SearchMatch;
use axum::{
    Json,
    extract::{Path, State},
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub embedding: Vec<f32>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub min_relevance: f64,
    #[serde(default)]
    pub with_embeddings: bool,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct NearestRequest {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub min_relevance: f64,
    #[serde(default)]
    pub with_embedding: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Serialize)]
pub struct NearestResponse {
    #[serde(rename = "match")]
    pub best: Option<SearchMatch>,
}

/// POST /collections/{name}/search
pub async fn nearest_matches(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let matches = state
        .store
        .nearest_matches(
            &name,
            req.embedding,
            req.limit,
            req.min_relevance,
            req.with_embeddings,
            cancel,
        )
        .try_collect()
        .await?;
    Ok(Json(SearchResponse { matches }))
}

/// POST /collections/{name}/search/nearest
pub async fn nearest_match(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<NearestRequest>,
) -> Result<Json<NearestResponse>, ApiError> {
    let (cancel, _guard) = request_cancellation();
    let best = state
        .store
        .nearest_match(&name, req.embedding, req.min_relevance, req.with_embedding, cancel)
        .await?;
    Ok(Json(NearestResponse { best }))
}
