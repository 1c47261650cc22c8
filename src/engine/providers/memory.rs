use crate::codec;
use crate::domain::CollectionSchema;
use crate::engine::{
    Document, DocumentEngine, VectorHit, VectorQuery, cosine_distance, project,
};
use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Engine backed by in-process maps.
///
/// Search is exact (brute force over every document under the index
/// prefix), which makes it the reference behaviour the other providers
/// approximate. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RwLock<EngineState>,
}

#[derive(Debug, Default)]
struct EngineState {
    indexes: BTreeMap<String, CollectionSchema>,
    documents: BTreeMap<String, Document>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, indexed or not.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }
}

#[async_trait]
impl DocumentEngine for InMemoryEngine {
    async fn create_index(&self, schema: &CollectionSchema) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        if state.indexes.contains_key(&schema.name) {
            return Err(EngineError::IndexExists(schema.name.clone()));
        }
        state.indexes.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    async fn drop_index(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.write().await;
        state
            .indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::UnknownIndex(name.to_string()))
    }

    async fn list_indexes(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.state.read().await.indexes.keys().cloned().collect())
    }

    async fn put_document(&self, key: &str, fields: Document) -> Result<(), EngineError> {
        self.state
            .write()
            .await
            .documents
            .insert(key.to_string(), fields);
        Ok(())
    }

    async fn get_document(&self, key: &str, paths: &[&str]) -> Result<Option<Document>, EngineError> {
        let state = self.state.read().await;
        Ok(state.documents.get(key).map(|doc| project(doc, paths)))
    }

    async fn delete_document(&self, key: &str) -> Result<bool, EngineError> {
        Ok(self.state.write().await.documents.remove(key).is_some())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn vector_query(&self, index: &str, query: &VectorQuery) -> Result<Vec<VectorHit>, EngineError> {
        let state = self.state.read().await;
        let schema = state
            .indexes
            .get(index)
            .ok_or_else(|| EngineError::UnknownIndex(index.to_string()))?;
        let (field, spec) = schema.vector_field(&query.field).ok_or_else(|| {
            EngineError::Protocol(format!("index `{index}` has no vector field `{}`", query.field))
        })?;

        let vector = codec::unpack_vector(&query.blob).map_err(|e| EngineError::Protocol(e.to_string()))?;
        if vector.len() != spec.dimension {
            return Err(EngineError::Protocol(format!(
                "query vector has {} dimensions, index `{index}` expects {}",
                vector.len(),
                spec.dimension
            )));
        }

        let vector_name = codec::field_name(&field.path);
        let mut scored: Vec<(f64, &String, &Document)> = state
            .documents
            .range(schema.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&schema.prefix))
            .filter_map(|(key, doc)| {
                // Documents without a usable vector are not part of the index.
                let stored = indexed_vector(doc.get(vector_name)?, spec.dimension)?;
                Some((cosine_distance(&vector, &stored), key, doc))
            })
            .collect();

        // Stable sort keeps key order among equal distances.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(query.k);

        Ok(scored
            .into_iter()
            .map(|(distance, key, doc)| VectorHit {
                document_key: key.clone(),
                distance,
                fields: project(doc, &query.return_fields),
            })
            .collect())
    }
}

fn indexed_vector(value: &Value, dimension: usize) -> Option<Vec<f32>> {
    let values = value.as_array()?;
    if values.len() != dimension {
        return None;
    }
    values.iter().map(|v| v.as_f64().map(|x| x as f32)).collect()
}
