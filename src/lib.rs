//! # provgraph - Provenance graph storage and CDM translation
//!
//! Ingests the OPM vertex/edge stream produced by an audit pipeline.
//!
//! provgraph provides:
//! - Content-addressed vertices and edges with free-form annotations
//! - A SQLite lineage store whose schema grows with the annotation keys it sees
//! - Bounded ancestor/descendant lineage queries over the stored graph
//! - A translator from OPM records to the Common Data Model, published through
//!   a pluggable sink

pub mod identity;
pub mod vertex;
pub mod edge;
pub mod graph;
pub mod transform;
pub mod storage;
pub mod translate;
pub mod stream;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use identity::ContentHash;
pub use vertex::{ArtifactSubtype, Vertex};
pub use edge::{Edge, EdgeKind};
pub use graph::ProvenanceGraph;
pub use storage::{LineageStore, ProvenanceStorage};
pub use translate::{CausalityTranslator, MappingError};

/// Result type alias for provgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for provgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid predicate (expected key:value): {0}")]
    InvalidPredicate(String),

    #[error("Invalid lineage direction: {0:?}")]
    InvalidDirection(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Vertex not found: {0}")]
    VertexNotFound(i64),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store is closed")]
    Closed,
}
