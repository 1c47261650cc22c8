//! Integration tests for the memory store over the in-process engine.
//!
//! These tests verify the store contract end to end:
//! - record round-trip, absence, idempotent remove, overwrite
//! - ranking and relevance thresholds in a 2-D collection
//! - collection isolation and cascade delete
//! - per-key batch outcomes, timeouts and cancellation

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use semantic_memory_store::codec;
use semantic_memory_store::domain::{CollectionSchema, MemoryRecord};
use semantic_memory_store::engine::{Document, DocumentEngine, InMemoryEngine, VectorHit, VectorQuery};
use semantic_memory_store::error::{EngineError, ErrorKind, MemoryStoreError, ResourceKind};
use semantic_memory_store::store::{MemoryStore, SemanticMemoryStore, StoreOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Utilities
// =============================================================================

fn options() -> StoreOptions {
    StoreOptions {
        vector_dimension: 2,
        batch_concurrency: 4,
        request_timeout: Duration::from_secs(5),
    }
}

fn setup_store() -> (Arc<InMemoryEngine>, SemanticMemoryStore) {
    let engine = Arc::new(InMemoryEngine::new());
    let store = SemanticMemoryStore::new(Arc::clone(&engine) as Arc<dyn DocumentEngine>, options());
    (engine, store)
}

async fn setup_collection(name: &str) -> (Arc<InMemoryEngine>, SemanticMemoryStore) {
    let (engine, store) = setup_store();
    store
        .create_collection(name, &CancellationToken::new())
        .await
        .expect("create collection");
    (engine, store)
}

/// Engine that fails every document operation on keys containing `poison`,
/// never answers for keys containing `hang`, and fails the first
/// `scan_failures` prefix scans.
#[derive(Debug)]
struct FlakyEngine {
    inner: InMemoryEngine,
    scan_failures: AtomicUsize,
}

impl FlakyEngine {
    fn new() -> Self {
        Self::with_scan_failures(0)
    }

    fn with_scan_failures(count: usize) -> Self {
        Self {
            inner: InMemoryEngine::new(),
            scan_failures: AtomicUsize::new(count),
        }
    }

    async fn check(key: &str) -> Result<(), EngineError> {
        if key.contains("hang") {
            std::future::pending::<()>().await;
        }
        if key.contains("poison") {
            return Err(EngineError::Unavailable(format!("connection reset on {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentEngine for FlakyEngine {
    async fn create_index(&self, schema: &CollectionSchema) -> Result<(), EngineError> {
        self.inner.create_index(schema).await
    }

    async fn drop_index(&self, name: &str) -> Result<(), EngineError> {
        self.inner.drop_index(name).await
    }

    async fn list_indexes(&self) -> Result<Vec<String>, EngineError> {
        self.inner.list_indexes().await
    }

    async fn put_document(&self, key: &str, fields: Document) -> Result<(), EngineError> {
        Self::check(key).await?;
        self.inner.put_document(key, fields).await
    }

    async fn get_document(&self, key: &str, paths: &[&str]) -> Result<Option<Document>, EngineError> {
        Self::check(key).await?;
        self.inner.get_document(key, paths).await
    }

    async fn delete_document(&self, key: &str) -> Result<bool, EngineError> {
        Self::check(key).await?;
        self.inner.delete_document(key).await
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        let failing = self
            .scan_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Unavailable("scan interrupted".into()));
        }
        self.inner.scan_keys(prefix).await
    }

    async fn vector_query(&self, index: &str, query: &VectorQuery) -> Result<Vec<VectorHit>, EngineError> {
        self.inner.vector_query(index, query).await
    }
}

fn flaky_store(request_timeout: Duration) -> SemanticMemoryStore {
    SemanticMemoryStore::new(
        Arc::new(FlakyEngine::new()),
        StoreOptions {
            request_timeout,
            ..options()
        },
    )
}

// =============================================================================
// Records
// =============================================================================

#[tokio::test]
async fn test_upsert_then_get_round_trips() {
    let (_, store) = setup_collection("notes").await;
    let cancel = CancellationToken::new();

    let key = store
        .upsert("notes", MemoryRecord::new("k1", "first note", vec![0.6, 0.8]), &cancel)
        .await
        .expect("upsert");
    assert_eq!(key, "k1");

    let record = store.get("notes", "k1", true, &cancel).await.expect("get").expect("present");
    assert_eq!(record, MemoryRecord::new("k1", "first note", vec![0.6, 0.8]));

    let record = store.get("notes", "k1", false, &cancel).await.expect("get").expect("present");
    assert_eq!(record.metadata, "first note");
    assert!(record.embedding.is_none());
}

#[tokio::test]
async fn test_get_missing_key_is_absent_not_error() {
    let (_, store) = setup_collection("notes").await;
    let found = store
        .get("notes", "nope", true, &CancellationToken::new())
        .await
        .expect("absence is not an error");
    assert!(found.is_none());
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let (engine, store) = setup_collection("notes").await;
    let cancel = CancellationToken::new();

    store
        .upsert("notes", MemoryRecord::new("k1", "x", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert");
    store.remove("notes", "k1", &cancel).await.expect("first remove");
    store.remove("notes", "k1", &cancel).await.expect("second remove");
    store.remove("notes", "never-existed", &cancel).await.expect("missing remove");

    assert!(store.get("notes", "k1", false, &cancel).await.expect("get").is_none());
    assert_eq!(engine.document_count().await, 0);
}

#[tokio::test]
async fn test_upsert_overwrites_whole_record() {
    let (engine, store) = setup_collection("notes").await;
    let cancel = CancellationToken::new();

    store
        .upsert("notes", MemoryRecord::new("k1", "old", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert");
    store
        .upsert("notes", MemoryRecord::new("k1", "new", vec![0.0, 1.0]), &cancel)
        .await
        .expect("overwrite");

    let record = store.get("notes", "k1", true, &cancel).await.expect("get").expect("present");
    assert_eq!(record.metadata, "new");
    assert_eq!(record.embedding, Some(vec![0.0, 1.0]));
    assert_eq!(engine.document_count().await, 1);
}

#[tokio::test]
async fn test_upsert_rejects_wrong_dimension() {
    let (engine, store) = setup_collection("notes").await;
    let err = store
        .upsert(
            "notes",
            MemoryRecord::new("k1", "x", vec![1.0, 0.0, 0.0]),
            &CancellationToken::new(),
        )
        .await
        .expect_err("3-D embedding into a 2-D collection");
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
    assert_eq!(engine.document_count().await, 0);
}

#[tokio::test]
async fn test_upsert_without_embedding_is_rejected() {
    let (_, store) = setup_collection("notes").await;
    let record = MemoryRecord::new("k1", "x", vec![1.0, 0.0]).without_embedding();
    let err = store
        .upsert("notes", record, &CancellationToken::new())
        .await
        .expect_err("no embedding");
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
}

#[tokio::test]
async fn test_upsert_rejects_non_finite_embedding() {
    let (engine, store) = setup_collection("notes").await;
    for bad in [f32::NAN, f32::INFINITY] {
        let err = store
            .upsert("notes", MemoryRecord::new("k1", "x", vec![bad, 0.0]), &CancellationToken::new())
            .await
            .expect_err("non-finite component");
        assert_eq!(err.kind(), ErrorKind::SchemaConflict);
    }
    assert_eq!(engine.document_count().await, 0);
}

#[tokio::test]
async fn test_invalid_collection_names_are_rejected() {
    let (_, store) = setup_store();
    let cancel = CancellationToken::new();

    for name in ["", "a:b", "all*", "two words"] {
        let err = store.create_collection(name, &cancel).await.expect_err(name);
        assert!(matches!(err, MemoryStoreError::InvalidCollectionName(_)), "{name}");
    }
}

// =============================================================================
// Collections
// =============================================================================

#[tokio::test]
async fn test_collection_lifecycle() {
    let (_, store) = setup_store();
    let cancel = CancellationToken::new();

    assert!(!store.collection_exists("notes", &cancel).await.expect("exists"));
    store.create_collection("notes", &cancel).await.expect("create");
    store.create_collection("facts", &cancel).await.expect("create");

    assert!(store.collection_exists("notes", &cancel).await.expect("exists"));
    assert!(!store.collection_exists("Notes", &cancel).await.expect("case-sensitive"));

    let mut names: Vec<String> = store.list_collections(cancel.clone()).try_collect().await.expect("list");
    names.sort();
    assert_eq!(names, vec!["facts".to_string(), "notes".to_string()]);
}

#[tokio::test]
async fn test_double_create_is_schema_conflict() {
    let (_, store) = setup_collection("notes").await;
    let err = store
        .create_collection("notes", &CancellationToken::new())
        .await
        .expect_err("second create");
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
}

#[tokio::test]
async fn test_delete_missing_collection_is_not_found() {
    let (_, store) = setup_store();
    let err = store
        .delete_collection("ghost", &CancellationToken::new())
        .await
        .expect_err("nothing to delete");
    assert!(matches!(
        err,
        MemoryStoreError::NotFound {
            kind: ResourceKind::Collection,
            ..
        }
    ));
}

#[tokio::test]
async fn test_delete_collection_cascades_to_its_records_only() {
    let (engine, store) = setup_store();
    let cancel = CancellationToken::new();
    store.create_collection("a", &cancel).await.expect("create a");
    store.create_collection("ab", &cancel).await.expect("create ab");

    for i in 0..5 {
        store
            .upsert("a", MemoryRecord::new(format!("k{i}"), "a", vec![1.0, 0.0]), &cancel)
            .await
            .expect("upsert a");
    }
    store
        .upsert("ab", MemoryRecord::new("k0", "ab", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert ab");

    let report = store.delete_collection("a", &cancel).await.expect("delete");
    assert!(report.is_complete());
    assert_eq!(report.documents_removed, 5);
    assert!(!store.collection_exists("a", &cancel).await.expect("exists"));

    assert_eq!(engine.document_count().await, 1);
    let survivor = store.get("ab", "k0", false, &cancel).await.expect("get").expect("present");
    assert_eq!(survivor.metadata, "ab");
}

#[tokio::test]
async fn test_delete_collection_retries_after_interrupted_scan() {
    let engine = Arc::new(FlakyEngine::with_scan_failures(1));
    let store = SemanticMemoryStore::new(Arc::clone(&engine) as Arc<dyn DocumentEngine>, options());
    let cancel = CancellationToken::new();
    store.create_collection("n", &cancel).await.expect("create");
    store
        .upsert("n", MemoryRecord::new("k", "x", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert");

    let err = store.delete_collection("n", &cancel).await.expect_err("scan fails");
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(store.collection_exists("n", &cancel).await.expect("exists"));

    let report = store.delete_collection("n", &cancel).await.expect("retry");
    assert!(report.is_complete());
    assert_eq!(report.documents_removed, 1);
    assert!(!store.collection_exists("n", &cancel).await.expect("exists"));
    assert_eq!(engine.inner.document_count().await, 0);
}

#[tokio::test]
async fn test_incomplete_delete_keeps_collection_and_reports_record_keys() {
    let engine = Arc::new(FlakyEngine::new());
    let store = SemanticMemoryStore::new(Arc::clone(&engine) as Arc<dyn DocumentEngine>, options());
    let cancel = CancellationToken::new();
    store.create_collection("n", &cancel).await.expect("create");
    store
        .upsert("n", MemoryRecord::new("ok", "x", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert");
    // Written behind the store's back: removing it always fails
    let stuck = codec::encode(&MemoryRecord::new("poison", "x", vec![0.0, 1.0])).expect("encode");
    engine
        .inner
        .put_document(&codec::document_key("n", "poison"), stuck)
        .await
        .expect("put");

    let report = store.delete_collection("n", &cancel).await.expect("delete");
    assert!(!report.is_complete());
    assert_eq!(report.documents_removed, 1);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(failed, vec!["poison"]);
    assert!(store.collection_exists("n", &cancel).await.expect("exists"));
    assert_eq!(engine.inner.document_count().await, 1);
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let (_, store) = setup_store();
    let cancel = CancellationToken::new();
    store.create_collection("a", &cancel).await.expect("create a");
    store.create_collection("b", &cancel).await.expect("create b");

    store
        .upsert("a", MemoryRecord::new("shared", "from a", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert a");
    store
        .upsert("b", MemoryRecord::new("shared", "from b", vec![0.0, 1.0]), &cancel)
        .await
        .expect("upsert b");

    let from_a = store.get("a", "shared", false, &cancel).await.expect("get").expect("present");
    assert_eq!(from_a.metadata, "from a");

    let matches: Vec<_> = store
        .nearest_matches("b", vec![1.0, 0.0], 10, 0.0, false, cancel.clone())
        .try_collect()
        .await
        .expect("search b");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.metadata, "from b");
}

// =============================================================================
// Similarity Search
// =============================================================================

async fn ranking_store() -> SemanticMemoryStore {
    let (_, store) = setup_collection("vectors").await;
    let cancel = CancellationToken::new();
    for record in [
        MemoryRecord::new("east", "east", vec![1.0, 0.0]),
        MemoryRecord::new("north", "north", vec![0.0, 1.0]),
        MemoryRecord::new("mostly-east", "mostly east", vec![0.9, 0.1]),
    ] {
        store.upsert("vectors", record, &cancel).await.expect("upsert");
    }
    store
}

#[tokio::test]
async fn test_nearest_matches_rank_best_first() {
    let store = ranking_store().await;

    let matches: Vec<_> = store
        .nearest_matches("vectors", vec![1.0, 0.0], 2, 0.0, false, CancellationToken::new())
        .try_collect()
        .await
        .expect("search");

    let keys: Vec<&str> = matches.iter().map(|m| m.record.key.as_str()).collect();
    assert_eq!(keys, vec!["east", "mostly-east"]);
    assert!((matches[0].relevance - 1.0).abs() < 1e-6);
    assert!(matches[0].relevance >= matches[1].relevance);
    assert!(matches.iter().all(|m| m.record.embedding.is_none()));
}

#[tokio::test]
async fn test_nearest_matches_apply_threshold_and_limit() {
    let store = ranking_store().await;
    let cancel = CancellationToken::new();

    let strict: Vec<_> = store
        .nearest_matches("vectors", vec![1.0, 0.0], 10, 0.95, true, cancel.clone())
        .try_collect()
        .await
        .expect("search");
    assert_eq!(strict.len(), 2);
    assert!(strict.iter().all(|m| m.relevance >= 0.95));
    assert!(strict.iter().all(|m| m.record.embedding.is_some()));

    let none: Vec<_> = store
        .nearest_matches("vectors", vec![1.0, 0.0], 0, 0.0, false, cancel)
        .try_collect()
        .await
        .expect("limit 0");
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_nearest_match_returns_best_or_nothing() {
    let store = ranking_store().await;
    let cancel = CancellationToken::new();

    let best = store
        .nearest_match("vectors", vec![0.1, 0.9], 0.5, true, cancel.clone())
        .await
        .expect("search")
        .expect("north clears 0.5");
    assert_eq!(best.record.key, "north");
    assert_eq!(best.record.embedding, Some(vec![0.0, 1.0]));

    // Pointing away from everything: nothing clears the threshold
    let none = store
        .nearest_match("vectors", vec![-1.0, -1.0], 0.5, false, cancel)
        .await
        .expect("search");
    assert!(none.is_none());
}

#[tokio::test]
async fn test_search_rejects_wrong_query_dimension() {
    let store = ranking_store().await;
    let err = store
        .nearest_match("vectors", vec![1.0, 0.0, 0.0], 0.0, false, CancellationToken::new())
        .await
        .expect_err("3-D query");
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
}

#[tokio::test]
async fn test_search_rejects_non_finite_query() {
    let store = ranking_store().await;
    let err = store
        .nearest_match("vectors", vec![f32::NAN, 0.0], 0.99, false, CancellationToken::new())
        .await
        .expect_err("NaN query");
    assert_eq!(err.kind(), ErrorKind::SchemaConflict);
}

#[tokio::test]
async fn test_search_unknown_collection_is_not_found() {
    let (_, store) = setup_store();
    let err = store
        .nearest_match("ghost", vec![1.0, 0.0], 0.0, false, CancellationToken::new())
        .await
        .expect_err("no index");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_get_batch_reports_hits_and_misses_in_order() {
    let store = ranking_store().await;

    let items: Vec<_> = store
        .get_batch(
            "vectors",
            vec!["north".into(), "missing".into(), "east".into()],
            false,
            CancellationToken::new(),
        )
        .collect()
        .await;

    let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["north", "missing", "east"]);
    assert!(matches!(&items[0].outcome, Ok(Some(r)) if r.metadata == "north"));
    assert!(matches!(&items[1].outcome, Ok(None)));
    assert!(matches!(&items[2].outcome, Ok(Some(r)) if r.metadata == "east"));
}

#[tokio::test]
async fn test_upsert_batch_partial_failure_does_not_stop_others() {
    let store = flaky_store(Duration::from_secs(5));
    let cancel = CancellationToken::new();
    store.create_collection("notes", &cancel).await.expect("create");

    let records = vec![
        MemoryRecord::new("a", "a", vec![1.0, 0.0]),
        MemoryRecord::new("poison", "p", vec![1.0, 0.0]),
        MemoryRecord::new("c", "c", vec![0.0, 1.0]),
        MemoryRecord::new("bad-dim", "d", vec![1.0]),
    ];
    let items: Vec<_> = store.upsert_batch("notes", records, cancel.clone()).collect().await;

    assert_eq!(items.len(), 4);
    assert!(items[0].is_ok());
    assert_eq!(items[1].error().map(MemoryStoreError::kind), Some(ErrorKind::Transport));
    assert!(items[1].error().is_some_and(MemoryStoreError::is_retryable));
    assert!(items[2].is_ok());
    assert_eq!(items[3].error().map(MemoryStoreError::kind), Some(ErrorKind::SchemaConflict));

    assert!(store.get("notes", "a", false, &cancel).await.expect("get").is_some());
    assert!(store.get("notes", "c", false, &cancel).await.expect("get").is_some());
}

#[tokio::test]
async fn test_remove_batch_attributes_failures_to_keys() {
    let store = flaky_store(Duration::from_secs(5));
    let cancel = CancellationToken::new();
    store.create_collection("notes", &cancel).await.expect("create");
    store
        .upsert("notes", MemoryRecord::new("a", "a", vec![1.0, 0.0]), &cancel)
        .await
        .expect("upsert");

    let items = store
        .remove_batch("notes", vec!["a".into(), "poison".into(), "missing".into()], &cancel)
        .await;

    let failed: Vec<&str> = items.iter().filter(|i| !i.is_ok()).map(|i| i.key.as_str()).collect();
    assert_eq!(failed, vec!["poison"]);
    assert!(store.get("notes", "a", false, &cancel).await.expect("get").is_none());
}

#[tokio::test]
async fn test_engine_call_times_out() {
    let store = flaky_store(Duration::from_millis(50));
    let cancel = CancellationToken::new();
    store.create_collection("notes", &cancel).await.expect("create");

    let err = store
        .upsert("notes", MemoryRecord::new("hang", "h", vec![1.0, 0.0]), &cancel)
        .await
        .expect_err("engine never answers");
    assert!(matches!(err, MemoryStoreError::Timeout(_)));
    assert!(err.is_retryable());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_token_short_circuits_calls() {
    let (engine, store) = setup_collection("notes").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = store
        .upsert("notes", MemoryRecord::new("k1", "x", vec![1.0, 0.0]), &cancel)
        .await
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(engine.document_count().await, 0);

    let err = store
        .nearest_match("notes", vec![1.0, 0.0], 0.0, false, cancel)
        .await
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_cancelled_batch_reports_every_item() {
    let (engine, store) = setup_collection("notes").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let records = (0..10)
        .map(|i| MemoryRecord::new(format!("k{i}"), "x", vec![1.0, 0.0]))
        .collect();
    let items: Vec<_> = store.upsert_batch("notes", records, cancel).collect().await;

    assert_eq!(items.len(), 10);
    assert!(
        items
            .iter()
            .all(|i| i.error().map(MemoryStoreError::kind) == Some(ErrorKind::Cancelled))
    );
    assert_eq!(engine.document_count().await, 0);
}

#[tokio::test]
async fn test_cancel_interrupts_hanging_call() {
    let store = flaky_store(Duration::from_secs(30));
    let cancel = CancellationToken::new();
    store.create_collection("notes", &cancel).await.expect("create");

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = store
        .get("notes", "hang", false, &cancel)
        .await
        .expect_err("cancelled mid-call");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
