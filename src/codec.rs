//! Record codec.
//!
//! Maps a [`MemoryRecord`] onto the document layout the engine stores
//! (`{"key", "metadata", "embedding"}` at the document root) and back, and
//! packs query vectors into the raw FLOAT32 blob the engine binds as a
//! query parameter.
//!
//! Records of collection `c` live at document key `c:<key>`; the index
//! declared for `c` covers exactly that prefix.

use crate::domain::MemoryRecord;
use crate::domain::schema::{EMBEDDING_FIELD, KEY_FIELD, METADATA_FIELD};
use crate::engine::Document;
use crate::error::{MemoryStoreError, Result};
use serde_json::Value;

const COLLECTION_SEPARATOR: char = ':';

const RECORD_FIELDS: &[&str] = &["$.key", "$.metadata"];
const RECORD_FIELDS_WITH_EMBEDDING: &[&str] = &["$.key", "$.metadata", "$.embedding"];

/// Collection names must not contain the separator, whitespace, or glob
/// characters: any of them would let one collection's prefix cover another's.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name
            .chars()
            .any(|c| c == COLLECTION_SEPARATOR || c == '*' || c.is_whitespace());
    if invalid {
        return Err(MemoryStoreError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

pub fn key_prefix(collection: &str) -> String {
    format!("{collection}{COLLECTION_SEPARATOR}")
}

pub fn document_key(collection: &str, key: &str) -> String {
    format!("{collection}{COLLECTION_SEPARATOR}{key}")
}

/// Inverse of [`document_key`]. `None` if the document is not in `collection`.
pub fn record_key<'a>(collection: &str, document_key: &'a str) -> Option<&'a str> {
    document_key
        .strip_prefix(collection)?
        .strip_prefix(COLLECTION_SEPARATOR)
}

/// Field paths to fetch for a point lookup.
pub fn projection(with_embedding: bool) -> &'static [&'static str] {
    if with_embedding {
        RECORD_FIELDS_WITH_EMBEDDING
    } else {
        RECORD_FIELDS
    }
}

/// Field paths to return for each nearest-neighbour hit. The key comes
/// back as the hit's document key, so it is not projected.
pub fn match_projection(with_embedding: bool) -> Vec<String> {
    let mut paths = vec![format!("$.{METADATA_FIELD}")];
    if with_embedding {
        paths.push(format!("$.{EMBEDDING_FIELD}"));
    }
    paths
}

/// Top-level field name addressed by a `$.name` path.
pub fn field_name(path: &str) -> &str {
    path.strip_prefix("$.").unwrap_or(path)
}

pub fn encode(record: &MemoryRecord) -> Result<Document> {
    let Some(embedding) = &record.embedding else {
        return Err(MemoryStoreError::SchemaConflict(format!(
            "record `{}` has no embedding",
            record.key
        )));
    };

    let mut doc = Document::new();
    doc.insert(KEY_FIELD.into(), Value::String(record.key.clone()));
    doc.insert(METADATA_FIELD.into(), Value::String(record.metadata.clone()));
    doc.insert(EMBEDDING_FIELD.into(), serde_json::to_value(embedding)?);
    Ok(doc)
}

pub fn decode(mut doc: Document) -> Result<MemoryRecord> {
    let key = take_string(&mut doc, KEY_FIELD)?;
    decode_with_key(key, doc)
}

/// Decodes a document whose key is known out of band (search hits).
pub fn decode_with_key(key: String, mut doc: Document) -> Result<MemoryRecord> {
    let metadata = take_string(&mut doc, METADATA_FIELD)?;
    let embedding = match doc.remove(EMBEDDING_FIELD) {
        None | Some(Value::Null) => None,
        Some(value) => Some(serde_json::from_value::<Vec<f32>>(value)?),
    };

    Ok(MemoryRecord {
        key,
        metadata,
        embedding,
    })
}

fn take_string(doc: &mut Document, field: &str) -> Result<String> {
    match doc.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(MemoryStoreError::Codec(format!(
            "field `{field}` is not a string: {other}"
        ))),
        None => Err(MemoryStoreError::Codec(format!("field `{field}` is missing"))),
    }
}

/// Raw little-endian FLOAT32 bytes of `vector`.
pub fn pack_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn unpack_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(MemoryStoreError::Codec(format!(
            "vector blob of {} bytes is not a FLOAT32 array",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_layout() {
        let record = MemoryRecord::new("k1", r#"{"text":"hello"}"#, vec![0.5, -1.0]);
        let doc = encode(&record).unwrap();

        assert_eq!(
            Value::Object(doc.clone()),
            json!({"key": "k1", "metadata": "{\"text\":\"hello\"}", "embedding": [0.5, -1.0]})
        );
        assert_eq!(decode(doc).unwrap(), record);
    }

    #[test]
    fn test_encode_requires_embedding() {
        let record = MemoryRecord::new("k1", "m", vec![]).without_embedding();
        let err = encode(&record).unwrap_err();
        assert!(matches!(err, MemoryStoreError::SchemaConflict(_)));
    }

    #[test]
    fn test_decode_projected_document_has_no_embedding() {
        let doc = json!({"key": "k1", "metadata": "m"});
        let Value::Object(doc) = doc else { unreachable!() };

        let record = decode(doc).unwrap();
        assert_eq!(record.key, "k1");
        assert!(record.embedding.is_none());
    }

    #[test]
    fn test_decode_empty_document_is_an_error() {
        let err = decode(Document::new()).unwrap_err();
        assert!(matches!(err, MemoryStoreError::Codec(_)));
    }

    #[test]
    fn test_projection_includes_embedding_only_on_request() {
        assert_eq!(projection(false), ["$.key", "$.metadata"]);
        assert_eq!(projection(true), ["$.key", "$.metadata", "$.embedding"]);
        assert_eq!(match_projection(false), ["$.metadata"]);
        assert_eq!(field_name("$.embedding"), "embedding");
    }

    #[test]
    fn test_pack_vector_is_little_endian_f32() {
        let blob = pack_vector(&[1.0, -2.5]);
        assert_eq!(blob, [0, 0, 128, 63, 0, 0, 32, 192]);
        assert_eq!(unpack_vector(&blob).unwrap(), [1.0, -2.5]);
        assert!(unpack_vector(&blob[..5]).is_err());
    }

    #[test]
    fn test_keys_and_collection_names() {
        assert_eq!(document_key("notes", "a:b"), "notes:a:b");
        assert_eq!(record_key("notes", "notes:a:b"), Some("a:b"));
        assert_eq!(record_key("notes", "notesx:a"), None);

        assert!(validate_collection_name("notes").is_ok());
        for bad in ["", "a:b", "a b", "a*"] {
            assert!(validate_collection_name(bad).is_err(), "{bad:?}");
        }
    }
}
