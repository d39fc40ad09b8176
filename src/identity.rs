//! Content identity for vertices and edges
//!
//! Every record in the provenance graph is content-addressed: its identity is a
//! BLAKE3 digest over its type and annotations (and, for edges, the digests of
//! both endpoints). The same digest is used as:
//! - the `hash` column of the lineage store (truncated to 64 bits)
//! - the record UUID of the causality translator (truncated to 128 bits)
//! - the key of the in-memory graph container

use std::collections::BTreeMap;
use std::fmt;

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a record type plus its annotations.
    pub fn of_record(kind: &str, annotations: &BTreeMap<String, String>) -> Self {
        let mut hasher = RecordHasher::new(kind);
        hasher.annotations(annotations);
        hasher.finish()
    }

    /// Hash an edge: type, both endpoint identities, then annotations.
    pub fn of_edge(
        kind: &str,
        source: &ContentHash,
        destination: &ContentHash,
        annotations: &BTreeMap<String, String>,
    ) -> Self {
        let mut hasher = RecordHasher::new(kind);
        hasher.digest(source);
        hasher.digest(destination);
        hasher.annotations(annotations);
        hasher.finish()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The 64-bit form stored in the relational `hash` columns.
    pub fn short(&self) -> i64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[..8]);
        i64::from_le_bytes(bytes)
    }

    /// The 128-bit form used as the identifier of translated records.
    pub fn uuid(&self) -> uuid::Uuid {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.0[..16]);
        uuid::Uuid::from_bytes(bytes)
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Length-prefixed field encoder so that `("ab", "c")` and `("a", "bc")`
/// never collide.
struct RecordHasher {
    inner: blake3::Hasher,
}

impl RecordHasher {
    fn new(kind: &str) -> Self {
        let mut hasher = Self {
            inner: blake3::Hasher::new(),
        };
        hasher.field(kind);
        hasher
    }

    fn field(&mut self, value: &str) {
        self.inner.update(&(value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
    }

    fn digest(&mut self, hash: &ContentHash) {
        self.inner.update(hash.as_bytes());
    }

    fn annotations(&mut self, annotations: &BTreeMap<String, String>) {
        self.inner.update(&(annotations.len() as u64).to_le_bytes());
        for (key, value) in annotations {
            self.field(key);
            self.field(value);
        }
    }

    fn finish(self) -> ContentHash {
        ContentHash(*self.inner.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_same_content_same_hash() {
        let a = ContentHash::of_record("Process", &annotations(&[("pid", "1"), ("name", "init")]));
        let b = ContentHash::of_record("Process", &annotations(&[("name", "init"), ("pid", "1")]));
        assert_eq!(a, b);
        assert_eq!(a.short(), b.short());
        assert_eq!(a.uuid(), b.uuid());
    }

    #[test]
    fn test_type_is_part_of_identity() {
        let ann = annotations(&[("pid", "1")]);
        assert_ne!(
            ContentHash::of_record("Process", &ann),
            ContentHash::of_record("Artifact", &ann)
        );
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let a = ContentHash::of_record("T", &annotations(&[("ab", "c")]));
        let b = ContentHash::of_record("T", &annotations(&[("a", "bc")]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_edge_hash_depends_on_endpoints() {
        let src = ContentHash::of_record("Process", &annotations(&[("pid", "1")]));
        let dst = ContentHash::of_record("Process", &annotations(&[("pid", "2")]));
        let ann = annotations(&[("operation", "fork")]);

        let forward = ContentHash::of_edge("WasTriggeredBy", &src, &dst, &ann);
        let backward = ContentHash::of_edge("WasTriggeredBy", &dst, &src, &ann);
        assert_ne!(forward, backward);
    }
}
