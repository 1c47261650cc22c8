//! The memory store capability.
//!
//! [`MemoryStore`] is the whole contract callers depend on: collection
//! lifecycle, point reads and writes, and nearest-neighbour search.
//! [`SemanticMemoryStore`] fulfils it on top of any
//! [`DocumentEngine`](crate::engine::DocumentEngine) by composing three
//! components:
//!
//! - [`CollectionManager`]: one search index per collection
//! - [`RecordStore`]: get / upsert / remove, single and batched
//! - [`SimilaritySearch`]: KNN query construction and relevance filtering
//!
//! Every operation takes a [`CancellationToken`]. Nothing is cached and
//! nothing is locked in process: two concurrent upserts of one key resolve
//! as last writer wins inside the engine.
//!
//! # Example
//!
//! ```rust
//! use semantic_memory_store::engine::InMemoryEngine;
//! use semantic_memory_store::store::{MemoryStore, SemanticMemoryStore, StoreOptions};
//! use semantic_memory_store::domain::MemoryRecord;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let options = StoreOptions { vector_dimension: 2, ..StoreOptions::default() };
//! let store = SemanticMemoryStore::new(Arc::new(InMemoryEngine::new()), options);
//! let cancel = CancellationToken::new();
//!
//! store.create_collection("notes", &cancel).await.unwrap();
//! store
//!     .upsert("notes", MemoryRecord::new("k1", "hello", vec![1.0, 0.0]), &cancel)
//!     .await
//!     .unwrap();
//!
//! let best = store
//!     .nearest_match("notes", vec![1.0, 0.0], 0.5, false, cancel)
//!     .await
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(best.record.metadata, "hello");
//! # }
//! ```

mod collections;
mod dispatch;
mod records;
mod search;

pub use collections::CollectionManager;
pub use records::RecordStore;
pub use search::{SimilaritySearch, relevance_from_distance};

use crate::domain::{BatchItem, CascadeReport, DEFAULT_VECTOR_DIMENSION, MemoryRecord, SearchMatch};
use crate::engine::DocumentEngine;
use crate::error::Result;
use async_trait::async_trait;
use dispatch::EngineHandle;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Tuning shared by all store components.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Declared embedding width of every collection.
    pub vector_dimension: usize,
    /// Maximum batch sub-operations in flight.
    pub batch_concurrency: usize,
    /// Upper bound for a single engine round trip.
    pub request_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            vector_dimension: DEFAULT_VECTOR_DIMENSION,
            batch_concurrency: 8,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync + std::fmt::Debug {
    // =========================================================================
    // Collections
    // =========================================================================

    async fn create_collection(&self, name: &str, cancel: &CancellationToken) -> Result<()>;

    /// Drop a collection and cascade-delete its records.
    async fn delete_collection(&self, name: &str, cancel: &CancellationToken) -> Result<CascadeReport>;

    async fn collection_exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool>;

    fn list_collections(&self, cancel: CancellationToken) -> BoxStream<'static, Result<String>>;

    // =========================================================================
    // Records
    // =========================================================================

    async fn get(
        &self,
        collection: &str,
        key: &str,
        with_embedding: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<MemoryRecord>>;

    fn get_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<Option<MemoryRecord>>>;

    async fn upsert(&self, collection: &str, record: MemoryRecord, cancel: &CancellationToken) -> Result<String>;

    fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<MemoryRecord>,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<String>>;

    async fn remove(&self, collection: &str, key: &str, cancel: &CancellationToken) -> Result<()>;

    async fn remove_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<()>>;

    // =========================================================================
    // Similarity Search
    // =========================================================================

    async fn nearest_match(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        min_relevance: f64,
        with_embedding: bool,
        cancel: CancellationToken,
    ) -> Result<Option<SearchMatch>>;

    fn nearest_matches(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        limit: usize,
        min_relevance: f64,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<SearchMatch>>;
}

/// [`MemoryStore`] over a [`DocumentEngine`].
#[derive(Debug, Clone)]
pub struct SemanticMemoryStore {
    collections: CollectionManager,
    records: RecordStore,
    search: SimilaritySearch,
}

impl SemanticMemoryStore {
    pub fn new(engine: Arc<dyn DocumentEngine>, options: StoreOptions) -> Self {
        let handle = EngineHandle::new(engine, options.request_timeout);
        Self {
            collections: CollectionManager::new(handle.clone(), options.clone()),
            records: RecordStore::new(handle.clone(), options.clone()),
            search: SimilaritySearch::new(handle, options),
        }
    }

    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn search(&self) -> &SimilaritySearch {
        &self.search
    }
}

#[async_trait]
impl MemoryStore for SemanticMemoryStore {
    async fn create_collection(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        self.collections.create(name, cancel).await
    }

    async fn delete_collection(&self, name: &str, cancel: &CancellationToken) -> Result<CascadeReport> {
        self.collections.delete(name, cancel).await
    }

    async fn collection_exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        self.collections.exists(name, cancel).await
    }

    fn list_collections(&self, cancel: CancellationToken) -> BoxStream<'static, Result<String>> {
        self.collections.list(cancel)
    }

    async fn get(
        &self,
        collection: &str,
        key: &str,
        with_embedding: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<MemoryRecord>> {
        self.records.get(collection, key, with_embedding, cancel).await
    }

    fn get_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<Option<MemoryRecord>>> {
        self.records.get_batch(collection, keys, with_embeddings, cancel)
    }

    async fn upsert(&self, collection: &str, record: MemoryRecord, cancel: &CancellationToken) -> Result<String> {
        self.records.upsert(collection, record, cancel).await
    }

    fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<MemoryRecord>,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<String>> {
        self.records.upsert_batch(collection, records, cancel)
    }

    async fn remove(&self, collection: &str, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.records.remove(collection, key, cancel).await
    }

    async fn remove_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<()>> {
        self.records.remove_batch(collection, keys, cancel).await
    }

    async fn nearest_match(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        min_relevance: f64,
        with_embedding: bool,
        cancel: CancellationToken,
    ) -> Result<Option<SearchMatch>> {
        self.search
            .nearest_match(collection, embedding, min_relevance, with_embedding, cancel)
            .await
    }

    fn nearest_matches(
        &self,
        collection: &str,
        embedding: Vec<f32>,
        limit: usize,
        min_relevance: f64,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<SearchMatch>> {
        self.search
            .nearest_matches(collection, embedding, limit, min_relevance, with_embeddings, cancel)
    }
}
