//! Edge types - causal relations between vertices
//!
//! The audit pipeline emits four OPM relation types:
//! - `WasTriggeredBy`: process → process (fork, clone, execve, ...)
//! - `WasGeneratedBy`: artifact → process (write, send, connect, ...)
//! - `Used`: process → artifact (read, recv, load, ...)
//! - `WasDerivedFrom`: artifact → artifact (rename, link, mmap, ...)
//!
//! Edges point from effect to cause, so following an edge from its source
//! walks toward ancestors.

use crate::identity::ContentHash;
use crate::vertex::Vertex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Well-known OPM edge types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    WasTriggeredBy,
    WasGeneratedBy,
    Used,
    WasDerivedFrom,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::WasTriggeredBy => "WasTriggeredBy",
            EdgeKind::WasGeneratedBy => "WasGeneratedBy",
            EdgeKind::Used => "Used",
            EdgeKind::WasDerivedFrom => "WasDerivedFrom",
        }
    }

    pub fn all() -> &'static [EdgeKind] {
        &[
            EdgeKind::WasTriggeredBy,
            EdgeKind::WasGeneratedBy,
            EdgeKind::Used,
            EdgeKind::WasDerivedFrom,
        ]
    }
}

impl FromStr for EdgeKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WasTriggeredBy" | "WasInformedBy" => Ok(EdgeKind::WasTriggeredBy),
            "WasGeneratedBy" => Ok(EdgeKind::WasGeneratedBy),
            "Used" => Ok(EdgeKind::Used),
            "WasDerivedFrom" => Ok(EdgeKind::WasDerivedFrom),
            _ => Err(crate::Error::Parse(format!("Unknown edge type: {}", s))),
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, annotated edge between two vertices.
///
/// The endpoints are carried by value: an edge's identity covers the
/// identity of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: Vertex,
    pub destination: Vertex,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(kind: impl Into<String>, source: Vertex, destination: Vertex) -> Self {
        Self {
            kind: kind.into(),
            source,
            destination,
            annotations: BTreeMap::new(),
        }
    }

    /// Builder-style annotation
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn operation(&self) -> Option<&str> {
        self.annotation("operation")
    }

    /// Parsed edge type, if it is one of the OPM relations
    pub fn edge_kind(&self) -> Option<EdgeKind> {
        self.kind.parse().ok()
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of_edge(
            &self.kind,
            &self.source.content_hash(),
            &self.destination.content_hash(),
            &self.annotations,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{ARTIFACT, PROCESS};

    fn process(pid: &str) -> Vertex {
        Vertex::new(PROCESS).with("pid", pid)
    }

    #[test]
    fn test_edge_kind_roundtrip() {
        for kind in EdgeKind::all() {
            let parsed: EdgeKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert_eq!("WasInformedBy".parse::<EdgeKind>().unwrap(), EdgeKind::WasTriggeredBy);
        assert!("WasControlledBy".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn test_identical_edges_share_identity() {
        let file = Vertex::new(ARTIFACT).with("path", "/etc/passwd");
        let a = Edge::new("Used", process("1"), file.clone()).with("operation", "read");
        let b = Edge::new("Used", process("1"), file).with("operation", "read");
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_endpoint_change_changes_identity() {
        let file = Vertex::new(ARTIFACT).with("path", "/etc/passwd");
        let a = Edge::new("Used", process("1"), file.clone()).with("operation", "read");
        let b = Edge::new("Used", process("2"), file).with("operation", "read");
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_operation_accessor() {
        let e = Edge::new("WasTriggeredBy", process("2"), process("1")).with("operation", "fork");
        assert_eq!(e.operation(), Some("fork"));
        assert_eq!(e.edge_kind(), Some(EdgeKind::WasTriggeredBy));
    }
}
