//! Point reads and writes of records, single and batched.

use super::StoreOptions;
use super::dispatch::{EngineHandle, fan_out};
use crate::codec;
use crate::domain::{BatchItem, MemoryRecord};
use crate::error::{MemoryStoreError, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RecordStore {
    engine: EngineHandle,
    options: StoreOptions,
}

impl RecordStore {
    pub(crate) fn new(engine: EngineHandle, options: StoreOptions) -> Self {
        Self { engine, options }
    }

    /// Fetch a record. `Ok(None)` when the key does not exist.
    pub async fn get(
        &self,
        collection: &str,
        key: &str,
        with_embedding: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<MemoryRecord>> {
        codec::validate_collection_name(collection)?;
        let doc_key = codec::document_key(collection, key);
        let paths = codec::projection(with_embedding);

        let doc = self
            .engine
            .call(cancel, self.engine.engine().get_document(&doc_key, paths))
            .await?;

        match doc {
            Some(doc) => codec::decode(doc).map(Some),
            None => {
                debug!(collection, key, "Record not found");
                Ok(None)
            }
        }
    }

    /// Write the whole record, replacing any previous value for its key.
    /// Returns the key as acknowledgment.
    pub async fn upsert(
        &self,
        collection: &str,
        record: MemoryRecord,
        cancel: &CancellationToken,
    ) -> Result<String> {
        codec::validate_collection_name(collection)?;
        check_dimension(&record, self.options.vector_dimension)?;

        let doc_key = codec::document_key(collection, &record.key);
        let doc = codec::encode(&record)?;
        self.engine
            .call(cancel, self.engine.engine().put_document(&doc_key, doc))
            .await?;

        debug!(collection, key = %record.key, "Record upserted");
        Ok(record.key)
    }

    /// Delete a record. Removing a missing key succeeds.
    pub async fn remove(&self, collection: &str, key: &str, cancel: &CancellationToken) -> Result<()> {
        codec::validate_collection_name(collection)?;
        let doc_key = codec::document_key(collection, key);

        let existed = self
            .engine
            .call(cancel, self.engine.engine().delete_document(&doc_key))
            .await?;

        debug!(collection, key, existed, "Record removed");
        Ok(())
    }

    /// Hit or miss per requested key, in request order.
    pub fn get_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        with_embeddings: bool,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<Option<MemoryRecord>>> {
        let store = self.clone();
        let collection = collection.to_string();
        let op_cancel = cancel.clone();
        let items = keys.into_iter().map(|key| (key.clone(), key)).collect();

        fan_out(items, self.options.batch_concurrency, cancel, move |key: String| {
            let store = store.clone();
            let collection = collection.clone();
            let cancel = op_cancel.clone();
            async move { store.get(&collection, &key, with_embeddings, &cancel).await }
        })
    }

    /// One acknowledgment (the key) or error per record, in request order.
    pub fn upsert_batch(
        &self,
        collection: &str,
        records: Vec<MemoryRecord>,
        cancel: CancellationToken,
    ) -> BoxStream<'static, BatchItem<String>> {
        let store = self.clone();
        let collection = collection.to_string();
        let op_cancel = cancel.clone();
        let items = records.into_iter().map(|r| (r.key.clone(), r)).collect();

        fan_out(items, self.options.batch_concurrency, cancel, move |record| {
            let store = store.clone();
            let collection = collection.clone();
            let cancel = op_cancel.clone();
            async move { store.upsert(&collection, record, &cancel).await }
        })
    }

    /// Remove every key; one failure does not stop the others.
    pub async fn remove_batch(
        &self,
        collection: &str,
        keys: Vec<String>,
        cancel: &CancellationToken,
    ) -> Vec<BatchItem<()>> {
        let store = self.clone();
        let owned_collection = collection.to_string();
        let op_cancel = cancel.clone();
        let items = keys.into_iter().map(|key| (key.clone(), key)).collect();

        let results: Vec<BatchItem<()>> = fan_out(
            items,
            self.options.batch_concurrency,
            cancel.clone(),
            move |key: String| {
                let store = store.clone();
                let collection = owned_collection.clone();
                let cancel = op_cancel.clone();
                async move { store.remove(&collection, &key, &cancel).await }
            },
        )
        .collect()
        .await;

        let failed = results.iter().filter(|item| !item.is_ok()).count();
        if failed > 0 {
            warn!(collection, failed, total = results.len(), "Batch remove partially failed");
        }
        results
    }
}

fn check_dimension(record: &MemoryRecord, dimension: usize) -> Result<()> {
    let len = record.embedding.as_ref().map_or(0, Vec::len);
    if len != dimension {
        return Err(MemoryStoreError::SchemaConflict(format!(
            "record `{}` has an embedding of {len} dimensions, collection expects {dimension}",
            record.key
        )));
    }
    if record.embedding.iter().flatten().any(|x| !x.is_finite()) {
        return Err(MemoryStoreError::SchemaConflict(format!(
            "record `{}` has a non-finite embedding component",
            record.key
        )));
    }
    Ok(())
}
