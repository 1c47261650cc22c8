use crate::codec;
use crate::domain::CollectionSchema;
use crate::engine::{Document, DocumentEngine, VectorHit, VectorQuery, project};
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use tracing::debug;

const INDEX_TABLE: &str = "memory_index";
const DOCUMENT_TABLE: &str = "memory_document";

/// Engine backed by SurrealDB.
///
/// Documents are kept twice per row: as a native object (`fields`) that
/// queries can address, and as JSON text (`body`) that is what gets read
/// back, so values round-trip exactly as they were written.
#[derive(Debug)]
pub struct SurrealEngine {
    db: Surreal<Any>,
}

impl SurrealEngine {
    /// Connect to `connection_string` (`surrealkv://path` or `ws://host:port`).
    pub async fn connect(
        connection_string: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, EngineError> {
        let db = connect(connection_string).await?;
        db.use_ns(namespace).use_db(database).await?;

        Ok(Self { db })
    }

    async fn schema(&self, name: &str) -> Result<CollectionSchema, EngineError> {
        let row: Option<IndexRow> = self.db.select((INDEX_TABLE, name)).await?;
        let row = row.ok_or_else(|| EngineError::UnknownIndex(name.to_string()))?;
        serde_json::from_str(&row.schema).map_err(|e| EngineError::Protocol(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexRow {
    name: String,
    schema: String,
}

#[derive(Debug, Serialize)]
struct DocumentRow {
    doc_key: String,
    fields: Document,
    body: String,
}

#[derive(Debug, Deserialize)]
struct StoredBody {
    doc_key: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct HitRow {
    doc_key: String,
    body: String,
    similarity: f64,
}

impl From<surrealdb::Error> for EngineError {
    fn from(err: surrealdb::Error) -> Self {
        EngineError::Unavailable(err.to_string())
    }
}

/// CREATE on an existing record id fails with "Database record `...`
/// already exists", both embedded and over the wire.
fn classify_create_error(name: &str, err: surrealdb::Error) -> EngineError {
    if is_duplicate_record(&err.to_string()) {
        EngineError::IndexExists(name.to_string())
    } else {
        err.into()
    }
}

fn is_duplicate_record(message: &str) -> bool {
    message.contains("already exists")
}

fn parse_body(row: &StoredBody) -> Result<Document, EngineError> {
    serde_json::from_str(&row.body).map_err(|e| {
        EngineError::Protocol(format!("document `{}` is not a JSON object: {e}", row.doc_key))
    })
}

#[async_trait]
impl DocumentEngine for SurrealEngine {
    async fn create_index(&self, schema: &CollectionSchema) -> Result<(), EngineError> {
        let row = IndexRow {
            name: schema.name.clone(),
            schema: serde_json::to_string(schema).map_err(|e| EngineError::Protocol(e.to_string()))?,
        };
        // A single CREATE: the record id is the index name, so a concurrent
        // create of the same name fails inside the database.
        let _: Option<IndexRow> = self
            .db
            .create((INDEX_TABLE, schema.name.as_str()))
            .content(row)
            .await
            .map_err(|e| classify_create_error(&schema.name, e))?;
        Ok(())
    }

    async fn drop_index(&self, name: &str) -> Result<(), EngineError> {
        let removed: Option<IndexRow> = self.db.delete((INDEX_TABLE, name)).await?;
        removed
            .map(|_| ())
            .ok_or_else(|| EngineError::UnknownIndex(name.to_string()))
    }

    async fn list_indexes(&self) -> Result<Vec<String>, EngineError> {
        let rows: Vec<IndexRow> = self.db.select(INDEX_TABLE).await?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    async fn put_document(&self, key: &str, fields: Document) -> Result<(), EngineError> {
        let body = serde_json::Value::Object(fields.clone()).to_string();
        let row = DocumentRow {
            doc_key: key.to_string(),
            fields,
            body,
        };
        let _: Option<StoredBody> = self.db.upsert((DOCUMENT_TABLE, key)).content(row).await?;
        Ok(())
    }

    async fn get_document(&self, key: &str, paths: &[&str]) -> Result<Option<Document>, EngineError> {
        let row: Option<StoredBody> = self.db.select((DOCUMENT_TABLE, key)).await?;

        match row {
            Some(row) => Ok(Some(project(&parse_body(&row)?, paths))),
            None => Ok(None),
        }
    }

    async fn delete_document(&self, key: &str) -> Result<bool, EngineError> {
        let removed: Option<StoredBody> = self.db.delete((DOCUMENT_TABLE, key)).await?;
        Ok(removed.is_some())
    }

    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, EngineError> {
        #[derive(Deserialize)]
        struct KeyRow {
            doc_key: String,
        }

        let sql = format!(
            "SELECT doc_key FROM {DOCUMENT_TABLE} WHERE string::starts_with(doc_key, $prefix)"
        );
        let mut response = self.db.query(sql).bind(("prefix", prefix.to_string())).await?;
        let rows: Vec<KeyRow> = response.take(0)?;
        Ok(rows.into_iter().map(|row| row.doc_key).collect())
    }

    async fn vector_query(&self, index: &str, query: &VectorQuery) -> Result<Vec<VectorHit>, EngineError> {
        let schema = self.schema(index).await?;
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
        if !vector_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(EngineError::Protocol(format!(
                "vector field path `{}` cannot be queried",
                field.path
            )));
        }

        // Documents without a vector of the index dimension are not indexed.
        let sql = format!(
            "SELECT doc_key, body, vector::similarity::cosine(fields.{vector_name}, $vector) AS similarity \
             FROM {DOCUMENT_TABLE} \
             WHERE string::starts_with(doc_key, $prefix) \
               AND type::is::array(fields.{vector_name}) \
               AND array::len(fields.{vector_name}) = $dimension \
             ORDER BY similarity DESC LIMIT {k}",
            k = query.k
        );
        debug!(index, k = query.k, "Running vector query");

        let mut response = self
            .db
            .query(sql)
            .bind(("vector", vector))
            .bind(("prefix", schema.prefix.clone()))
            .bind(("dimension", spec.dimension))
            .await?;
        let rows: Vec<HitRow> = response.take(0)?;

        rows.into_iter()
            .map(|row| {
                let stored = StoredBody {
                    doc_key: row.doc_key,
                    body: row.body,
                };
                let doc = parse_body(&stored)?;
                Ok(VectorHit {
                    fields: project(&doc, &query.return_fields),
                    document_key: stored.doc_key,
                    distance: 1.0 - row.similarity,
                })
            })
            .collect()
    }
}
