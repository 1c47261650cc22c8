//! Document / vector-index engine abstraction.
//!
//! The store never talks to a database directly; it talks to a
//! [`DocumentEngine`]: something that keeps JSON documents under string
//! keys, declares search indexes over key prefixes, and answers k-nearest
//! neighbour queries against an index's vector field.
//!
//! # Providers
//!
//! - [`InMemoryEngine`]: exact search over an in-process map. Used by tests
//!   and by the `memory` engine setting.
//! - [`SurrealEngine`]: SurrealDB, local (`surrealkv://`) or remote (`ws://`).

use crate::domain::CollectionSchema;
use crate::error::EngineError;
use async_trait::async_trait;

pub mod providers;

pub use providers::memory::InMemoryEngine;
pub use providers::surreal::SurrealEngine;

/// A stored document: top-level fields by name.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A k-nearest-neighbour request against one index.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    /// Alias of the vector field to search.
    pub field: String,
    /// Query vector as raw little-endian FLOAT32 bytes.
    pub blob: Vec<u8>,
    pub k: usize,
    /// Paths to project into each hit, e.g. `$.metadata`.
    pub return_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VectorHit {
    pub document_key: String,
    /// Distance under the index metric; smaller is closer.
    pub distance: f64,
    pub fields: Document,
}

#[async_trait]
pub trait DocumentEngine: Send + Sync + std::fmt::Debug {
    // =========================================================================
    // Index Management
    // =========================================================================

    /// Declare an index. Fails with [`EngineError::IndexExists`] if the name is taken.
    async fn create_index(&self, schema: &CollectionSchema) -> Result<(), EngineError>;

    /// Drop an index, leaving its documents in place.
    async fn drop_index(&self, name: &str) -> Result<(), EngineError>;

    async fn list_indexes(&self) -> Result<Vec<String>, EngineError>;

    // =========================================================================
    // Documents
    // =========================================================================

    /// Write `fields` as the whole document at `key`, replacing any previous value.
    async fn put_document(&self, key: &str, fields: Document) -> Result<(), EngineError>;

    /// Fetch the given paths of the document at `key`, or `None` if absent.
    async fn get_document(&self, key: &str, paths: &[&str]) -> Result<Option<Document>, EngineError>;

    /// Delete the document at `key`. Returns whether it existed.
    async fn delete_document(&self, key: &str) -> Result<bool, EngineError>;

    /// Keys of all documents starting with `prefix`.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, EngineError>;

    // =========================================================================
    // Search
    // =========================================================================

    /// Up to `query.k` documents of `index`, nearest first.
    async fn vector_query(&self, index: &str, query: &VectorQuery) -> Result<Vec<VectorHit>, EngineError>;
}

/// Cosine distance in `[0, 2]`. A zero vector is treated as orthogonal to everything.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot_product: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        1.0
    } else {
        1.0 - dot_product / (norm_a * norm_b)
    }
}

/// Keep only the fields named by `paths`.
pub(crate) fn project(doc: &Document, paths: &[impl AsRef<str>]) -> Document {
    paths
        .iter()
        .filter_map(|path| {
            let name = crate::codec::field_name(path.as_ref());
            doc.get(name).map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}
