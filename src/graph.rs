//! Provenance Graph - in-memory container for query results
//!
//! Lineage queries and vertex lookups assemble their results here. Vertices
//! and edges are keyed by content hash, so inserting the same record twice
//! is a no-op.

use std::collections::{BTreeMap, HashMap};
use serde::{Serialize, Serializer};
use serde::ser::SerializeStruct;
use crate::edge::Edge;
use crate::identity::ContentHash;
use crate::vertex::Vertex;

/// In-memory provenance graph.
#[derive(Debug, Default, Clone)]
pub struct ProvenanceGraph {
    /// All vertices indexed by content hash
    vertices: BTreeMap<ContentHash, Vertex>,
    /// All edges indexed by content hash
    edges: BTreeMap<ContentHash, Edge>,
    /// Outgoing edge hashes per source vertex
    edges_from: HashMap<ContentHash, Vec<ContentHash>>,
    /// Incoming edge hashes per destination vertex
    edges_to: HashMap<ContentHash, Vec<ContentHash>>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex; returns false if it was already present
    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        let hash = vertex.content_hash();
        if self.vertices.contains_key(&hash) {
            return false;
        }
        self.vertices.insert(hash, vertex);
        true
    }

    /// Add an edge together with both of its endpoints
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let hash = edge.content_hash();
        if self.edges.contains_key(&hash) {
            return false;
        }
        let from = edge.source.content_hash();
        let to = edge.destination.content_hash();

        self.add_vertex(edge.source.clone());
        self.add_vertex(edge.destination.clone());

        self.edges_from.entry(from).or_default().push(hash);
        self.edges_to.entry(to).or_default().push(hash);
        self.edges.insert(hash, edge);
        true
    }

    pub fn vertex(&self, hash: &ContentHash) -> Option<&Vertex> {
        self.vertices.get(hash)
    }

    pub fn contains_vertex(&self, vertex: &Vertex) -> bool {
        self.vertices.contains_key(&vertex.content_hash())
    }

    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains_key(&edge.content_hash())
    }

    /// Outgoing edges of a vertex
    pub fn edges_from(&self, hash: &ContentHash) -> Vec<&Edge> {
        self.edges_from
            .get(hash)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    /// Incoming edges of a vertex
    pub fn edges_to(&self, hash: &ContentHash) -> Vec<&Edge> {
        self.edges_to
            .get(hash)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    /// Vertices carrying `key = value`
    pub fn find_vertices(&self, key: &str, value: &str) -> Vec<&Vertex> {
        self.vertices
            .values()
            .filter(|v| v.annotation(key) == Some(value))
            .collect()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for vertex in self.vertices.values() {
            *by_type.entry(vertex.kind.clone()).or_default() += 1;
        }
        GraphStats {
            vertices: self.vertices.len(),
            edges: self.edges.len(),
            vertices_by_type: by_type,
        }
    }
}

impl Serialize for ProvenanceGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let vertices: Vec<&Vertex> = self.vertices.values().collect();
        let edges: Vec<&Edge> = self.edges.values().collect();
        let mut state = serializer.serialize_struct("ProvenanceGraph", 2)?;
        state.serialize_field("vertices", &vertices)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }
}

/// Statistics about a provenance graph
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
    pub vertices_by_type: BTreeMap<String, usize>,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Vertices: {}", self.vertices)?;
        for (kind, count) in &self.vertices_by_type {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        writeln!(f, "  Edges: {}", self.edges)
    }
}
