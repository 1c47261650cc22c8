//! Collection lifecycle: one search index per collection.

use super::StoreOptions;
use super::dispatch::{EngineHandle, fan_out};
use crate::codec;
use crate::domain::{BatchItem, CascadeReport, CollectionSchema};
use crate::error::{MemoryStoreError, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CollectionManager {
    engine: EngineHandle,
    options: StoreOptions,
}

impl CollectionManager {
    pub(crate) fn new(engine: EngineHandle, options: StoreOptions) -> Self {
        Self { engine, options }
    }

    /// Declare the collection's index. Fails with `SchemaConflict` if it already exists.
    pub async fn create(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        codec::validate_collection_name(name)?;
        let schema = CollectionSchema::for_memory_records(
            name,
            codec::key_prefix(name),
            self.options.vector_dimension,
        );

        self.engine
            .call(cancel, self.engine.engine().create_index(&schema))
            .await?;

        info!(
            collection = name,
            dimension = self.options.vector_dimension,
            "Collection created"
        );
        Ok(())
    }

    /// Exact, case-sensitive match against the engine's index list.
    pub async fn exists(&self, name: &str, cancel: &CancellationToken) -> Result<bool> {
        let indexes = self
            .engine
            .call(cancel, self.engine.engine().list_indexes())
            .await?;
        Ok(indexes.iter().any(|index| index == name))
    }

    /// Collection names in engine order. The stream fetches on first poll
    /// and cannot be restarted.
    pub fn list(&self, cancel: CancellationToken) -> BoxStream<'static, Result<String>> {
        let engine = self.engine.clone();
        async_stream::try_stream! {
            let names = engine.call(&cancel, engine.engine().list_indexes()).await?;
            debug!(count = names.len(), "Listed collections");
            for name in names {
                yield name;
            }
        }
        .boxed()
    }

    /// Remove every document under the collection's key prefix, then drop
    /// its index. Document removals are best effort: failures are listed in
    /// the report and the remaining documents are still attempted. The index
    /// is only dropped once every document is gone, so an incomplete or
    /// failed delete can be retried.
    pub async fn delete(&self, name: &str, cancel: &CancellationToken) -> Result<CascadeReport> {
        codec::validate_collection_name(name)?;
        if !self.exists(name, cancel).await? {
            return Err(MemoryStoreError::collection_not_found(name));
        }

        let engine = self.engine.engine();
        let keys = self
            .engine
            .call(cancel, engine.scan_keys(&codec::key_prefix(name)))
            .await?;

        let handle = self.engine.clone();
        let op_cancel = cancel.clone();
        let items = keys
            .into_iter()
            .map(|doc_key| {
                let key = codec::record_key(name, &doc_key).unwrap_or(&doc_key).to_string();
                (key, doc_key)
            })
            .collect();
        let results: Vec<BatchItem<()>> = fan_out(
            items,
            self.options.batch_concurrency,
            cancel.clone(),
            move |doc_key: String| {
                let handle = handle.clone();
                let cancel = op_cancel.clone();
                async move {
                    handle
                        .call(&cancel, handle.engine().delete_document(&doc_key))
                        .await
                        .map(|_| ())
                }
            },
        )
        .collect()
        .await;

        let (removed, failures): (Vec<_>, Vec<_>) = results.into_iter().partition(BatchItem::is_ok);
        let report = CascadeReport {
            collection: name.to_string(),
            documents_removed: removed.len(),
            failures,
        };

        if !report.is_complete() {
            warn!(
                collection = name,
                documents_removed = report.documents_removed,
                failed = report.failures.len(),
                "Collection delete incomplete, index kept for retry"
            );
            return Ok(report);
        }

        self.engine.call(cancel, engine.drop_index(name)).await?;
        info!(
            collection = name,
            documents_removed = report.documents_removed,
            "Collection deleted"
        );
        Ok(report)
    }
}
