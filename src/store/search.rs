//! Nearest-neighbour search over a collection's embedding field.
//!
//! The engine ranks by cosine distance (smaller is closer). Every score
//! leaving this module is a relevance in `[0, 1]`: `1 - distance`, clamped,
//! so 1.0 is a perfect match. Thresholds compare with `>=` against that
//! relevance, client-side, after the engine has returned its `k` candidates.

use super::StoreOptions;
use super::dispatch::EngineHandle;
use crate::codec;
use crate::domain::SearchMatch;
use crate::domain::schema::EMBEDDING_FIELD;
use crate::engine::VectorQuery;
use crate::error::{MemoryStoreError, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct SimilaritySearch {
    engine: EngineHandle,
    options: StoreOptions,
}

/// Relevance of a hit at cosine `distance`. A non-finite distance (an
/// engine comparing against a zero vector) scores 0.0.
pub fn relevance_from_distance(distance: f64) -> f64 {
    if distance.is_finite() {
        (1.0 - distance).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl SimilaritySearch {
    pub(crate) fn new(engine: EngineHandle, options: StoreOptions) -> Self {
        Self { engine, options }
    }

    pub(crate) fn build_query(&self, embedding: &[f32], limit: usize, with_embeddings: bool) -> Result<VectorQuery> {
        if embedding.len() != self.options.vector_dimension {
            return Err(MemoryStoreError::SchemaConflict(format!(
                "query embedding has {} dimensions, collection expects {}",
                embedding.len(),
                self.options.vector_dimension
            )));
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(MemoryStoreError::SchemaConflict(
                "query embedding contains a non-finite component".to_string(),
            ));
        }

        Ok(VectorQuery {
            field: EMBEDDING_FIELD.to_string(),
            blob: codec::pack_vector(embedding),
            k: limit,
            return_fields: codec::match_projection(with_embeddings),
        })
    }

    /// Up to `limit` matches with relevance `>= min_relevance`, best first.
    pub fn nearest_matches(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        limit: usize,
        min_relevance: f64,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<SearchMatch>> {
        let search = self.clone();
        let collection = collection.to_string();

        async_stream::try_stream! {
            codec::validate_collection_name(&collection)?;
            let query = search.build_query(&embedding, limit, with_embeddings)?;

            let hits = if limit == 0 {
                Vec::new()
            } else {
                search
                    .engine
                    .call(&cancel, search.engine.engine().vector_query(&collection, &query))
                    .await?
            };
            debug!(collection = %collection, candidates = hits.len(), "Vector query returned");

            for hit in hits {
                if cancel.is_cancelled() {
                    Err(MemoryStoreError::Cancelled)?;
                }

                let relevance = relevance_from_distance(hit.distance);
                // `>=` so a NaN threshold keeps nothing
                let keep = relevance >= min_relevance;
                if !keep {
                    trace!(document = %hit.document_key, relevance, "Below relevance threshold");
                    continue;
                }

                let key = codec::record_key(&collection, &hit.document_key).ok_or_else(|| {
                    MemoryStoreError::Codec(format!(
                        "hit `{}` is outside collection `{collection}`",
                        hit.document_key
                    ))
                })?;
                let record = codec::decode_with_key(key.to_string(), hit.fields)?;
                yield SearchMatch { record, relevance };
            }
        }
        .boxed()
    }

    /// The single best match if it clears `min_relevance`, never the
    /// least-bad candidate below it.
    pub async fn nearest_match(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        min_relevance: f64,
        with_embedding: bool,
        cancel: CancellationToken,
    ) -> Result<Option<SearchMatch>> {
        self.nearest_matches(collection, embedding, 1, min_relevance, with_embedding, cancel)
            .next()
            .await
            .transpose()
    }
}
