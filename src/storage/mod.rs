//! Storage Layer - where provenance records end up
//!
//! Two backends accept the same record stream:
//! - `LineageStore`: SQLite tables VERTEX(vertexId, type, hash, ...) and
//!   EDGE(edgeId, type, hash, srcVertexHash, dstVertexHash, ...)
//! - `CausalityTranslator`: maps records to CDM and publishes them

pub mod schema;
pub mod sqlite;

pub use sqlite::{LineageStore, Predicate, StoreStats};

use crate::edge::Edge;
use crate::vertex::Vertex;
use crate::{Error, Result};

/// Common entry points shared by every backend.
///
/// Ingestion must not stall on a bad record, so each call reports plain
/// success or failure and logs the detail.
pub trait ProvenanceStorage {
    fn name(&self) -> &'static str;

    fn put_vertex(&self, vertex: &Vertex) -> bool;

    fn put_edge(&self, edge: &Edge) -> bool;

    /// Flush and release resources. Safe to call more than once.
    fn shutdown(&self) -> bool;
}

impl ProvenanceStorage for LineageStore {
    fn name(&self) -> &'static str {
        "lineage"
    }

    fn put_vertex(&self, vertex: &Vertex) -> bool {
        self.insert_vertex(vertex)
            .map_err(|e| tracing::error!("Vertex not stored: {}", e))
            .is_ok()
    }

    fn put_edge(&self, edge: &Edge) -> bool {
        self.insert_edge(edge)
            .map_err(|e| tracing::error!("Edge not stored: {}", e))
            .is_ok()
    }

    fn shutdown(&self) -> bool {
        self.close()
            .map_err(|e| tracing::error!("Lineage store shutdown failed: {}", e))
            .is_ok()
    }
}

/// Which way a lineage walk follows edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From an effect toward its causes (source to destination)
    Ancestors,
    /// From a cause toward its effects (destination to source)
    Descendants,
}

/// The configured words for each direction. Callers may pass any
/// case-insensitive prefix of either word.
#[derive(Debug, Clone)]
pub struct DirectionLabels {
    ancestors: String,
    descendants: String,
}

impl DirectionLabels {
    pub fn new(ancestors: &str, descendants: &str) -> Self {
        Self {
            ancestors: ancestors.to_lowercase(),
            descendants: descendants.to_lowercase(),
        }
    }

    pub fn resolve(&self, direction: &str) -> Result<Direction> {
        let wanted = direction.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(Error::InvalidDirection(direction.to_string()));
        }
        if self.ancestors.starts_with(&wanted) {
            Ok(Direction::Ancestors)
        } else if self.descendants.starts_with(&wanted) {
            Ok(Direction::Descendants)
        } else {
            Err(Error::InvalidDirection(direction.to_string()))
        }
    }
}

impl Default for DirectionLabels {
    fn default() -> Self {
        Self::new("ancestors", "descendants")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_prefixes() {
        let labels = DirectionLabels::default();
        assert_eq!(labels.resolve("Anc").unwrap(), Direction::Ancestors);
        assert_eq!(labels.resolve("d").unwrap(), Direction::Descendants);
        assert_eq!(labels.resolve("DESCENDANTS").unwrap(), Direction::Descendants);
        assert!(labels.resolve("").is_err());
        assert!(labels.resolve("descendantsx").is_err());
    }

    #[test]
    fn test_custom_labels() {
        let labels = DirectionLabels::new("up", "down");
        assert_eq!(labels.resolve("u").unwrap(), Direction::Ancestors);
        assert!(labels.resolve("ancestors").is_err());
    }

    #[test]
    fn test_trait_reports_closed_store() {
        let store = LineageStore::open_in_memory().unwrap();
        let vertex = Vertex::new(crate::vertex::PROCESS).with("pid", "1");
        assert!(store.put_vertex(&vertex));
        assert!(ProvenanceStorage::shutdown(&store));
        assert!(ProvenanceStorage::shutdown(&store));
        assert!(!store.put_vertex(&vertex));
    }
}
