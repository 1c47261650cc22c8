pub mod record;
pub mod schema;

pub use record::{BatchItem, CascadeReport, MemoryRecord, SearchMatch};
pub use schema::{
    CollectionSchema, DEFAULT_VECTOR_DIMENSION, DistanceMetric, FieldKind, FieldSchema,
    IndexAlgorithm, VectorFieldSpec,
};
