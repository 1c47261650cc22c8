//! Semantic memory store
//!
//! Keyed records (a text payload plus an embedding) grouped into named
//! collections, with nearest-neighbour search inside a collection.
//!
//! # Architecture
//!
//! - **Store**: the [`store::MemoryStore`] capability and its engine-backed implementation
//! - **Engine**: the [`engine::DocumentEngine`] boundary with in-process and SurrealDB providers
//! - **Server**: Axum HTTP surface over the store
//!
//! # Modules
//!
//! - [`codec`]: record to document mapping, key layout, vector packing
//! - [`domain`]: records, matches, batch outcomes, index schemas
//! - [`store`]: collection manager, record store, similarity search
//! - [`api`]: HTTP handlers and error mapping

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod api;
pub mod codec;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod server;
pub mod store;
pub mod telemetry;

pub use domain::{BatchItem, CascadeReport, MemoryRecord, SearchMatch};
pub use error::{MemoryStoreError, Result};
pub use store::{MemoryStore, SemanticMemoryStore, StoreOptions};
