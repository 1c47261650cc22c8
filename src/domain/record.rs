use crate::error::{MemoryStoreError, Result};
use serde::{Deserialize, Serialize};

/// The unit of storage: a keyed text payload plus its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub key: String,
    /// Opaque caller-defined payload.
    pub metadata: String,
    /// Present when stored, or when a read asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    pub fn new(key: impl Into<String>, metadata: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            key: key.into(),
            metadata: metadata.into(),
            embedding: Some(embedding),
        }
    }

    /// Same record with the embedding dropped.
    #[must_use]
    pub fn without_embedding(mut self) -> Self {
        self.embedding = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub record: MemoryRecord,
    /// 1.0 is a perfect match, 0.0 is unrelated or opposite.
    pub relevance: f64,
}

/// Outcome of one item of a batch operation, attributed to its key.
#[derive(Debug)]
pub struct BatchItem<T> {
    pub key: String,
    pub outcome: Result<T>,
}

impl<T> BatchItem<T> {
    pub fn new(key: impl Into<String>, outcome: Result<T>) -> Self {
        Self {
            key: key.into(),
            outcome,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&MemoryStoreError> {
        self.outcome.as_ref().err()
    }
}

/// Result of deleting a collection together with its documents.
#[derive(Debug)]
pub struct CascadeReport {
    pub collection: String,
    pub documents_removed: usize,
    /// Records whose removal failed, by record key. The collection is kept
    /// while any remain, so the delete can be retried.
    pub failures: Vec<BatchItem<()>>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
