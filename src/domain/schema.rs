//! Index schema declared for every collection.

use serde::{Deserialize, Serialize};

/// Embedding width produced by the default embedding model.
pub const DEFAULT_VECTOR_DIMENSION: usize = 1536;

pub const KEY_FIELD: &str = "key";
pub const METADATA_FIELD: &str = "metadata";
pub const EMBEDDING_FIELD: &str = "embedding";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMetric {
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexAlgorithm {
    Hnsw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorFieldSpec {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub algorithm: IndexAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Vector(VectorFieldSpec),
}

/// A document path bound to an index field alias, e.g. `$.embedding` as `embedding`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub path: String,
    pub alias: String,
    pub kind: FieldKind,
}

impl FieldSchema {
    fn at_root(alias: &str, kind: FieldKind) -> Self {
        Self {
            path: format!("$.{alias}"),
            alias: alias.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    /// Only documents whose key starts with this prefix are indexed.
    pub prefix: String,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// Schema for memory records: `key` and `metadata` as text, `embedding`
    /// as a cosine HNSW vector of `dimension` floats.
    pub fn for_memory_records(name: &str, prefix: String, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            prefix,
            fields: vec![
                FieldSchema::at_root(KEY_FIELD, FieldKind::Text),
                FieldSchema::at_root(METADATA_FIELD, FieldKind::Text),
                FieldSchema::at_root(
                    EMBEDDING_FIELD,
                    FieldKind::Vector(VectorFieldSpec {
                        dimension,
                        metric: DistanceMetric::Cosine,
                        algorithm: IndexAlgorithm::Hnsw,
                    }),
                ),
            ],
        }
    }

    /// Looks up a vector field by alias.
    pub fn vector_field(&self, alias: &str) -> Option<(&FieldSchema, VectorFieldSpec)> {
        self.fields.iter().find_map(|field| match field.kind {
            FieldKind::Vector(spec) if field.alias == alias => Some((field, spec)),
            _ => None,
        })
    }
}
