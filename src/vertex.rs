//! Vertex types - the content-addressed unit of the provenance graph
//!
//! A vertex is a type plus a bag of string annotations. Well-known types:
//! - `Process`: a running program (annotated with `pid`, `ppid`, `uid`, ...)
//! - `Artifact`: a data object, further classified by its `subtype`
//! - `Agent`: a user identity

use crate::identity::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const PROCESS: &str = "Process";
pub const ARTIFACT: &str = "Artifact";
pub const AGENT: &str = "Agent";

/// Artifact subtypes as reported by the audit pipeline in the `subtype`
/// annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSubtype {
    File,
    Network,
    Memory,
    Pipe,
    /// A descriptor the auditor could not classify (`/<pid>/fd/<fd>`)
    Unknown,
}

impl ArtifactSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactSubtype::File => "file",
            ArtifactSubtype::Network => "network",
            ArtifactSubtype::Memory => "memory",
            ArtifactSubtype::Pipe => "pipe",
            ArtifactSubtype::Unknown => "unknown",
        }
    }

    pub fn all() -> &'static [ArtifactSubtype] {
        &[
            ArtifactSubtype::File,
            ArtifactSubtype::Network,
            ArtifactSubtype::Memory,
            ArtifactSubtype::Pipe,
            ArtifactSubtype::Unknown,
        ]
    }
}

impl FromStr for ArtifactSubtype {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ArtifactSubtype::File),
            "network" => Ok(ArtifactSubtype::Network),
            "memory" => Ok(ArtifactSubtype::Memory),
            "pipe" => Ok(ArtifactSubtype::Pipe),
            "unknown" => Ok(ArtifactSubtype::Unknown),
            _ => Err(crate::Error::Parse(format!("Unknown artifact subtype: {}", s))),
        }
    }
}

impl std::fmt::Display for ArtifactSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vertex in the provenance graph.
///
/// Two vertices with the same type and annotations are the same vertex,
/// regardless of the order the annotations were added in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Vertex {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
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

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.annotations.remove(key)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Raw `subtype` annotation
    pub fn subtype(&self) -> Option<&str> {
        self.annotation("subtype")
    }

    pub fn artifact_subtype(&self) -> Option<ArtifactSubtype> {
        self.subtype().and_then(|s| s.parse().ok())
    }

    pub fn is_process(&self) -> bool {
        self.kind == PROCESS
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of_record(&self.kind, &self.annotations)
    }
}
