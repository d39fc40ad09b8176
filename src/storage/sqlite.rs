//! SQLite lineage store
//!
//! Persists vertices and edges into the VERTEX/EDGE tables, growing the
//! schema as new annotation keys appear, and answers vertex lookups and
//! bounded lineage walks over the persisted graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use crate::{Error, Result};
use crate::config::{ensure_db_dir, ConnectionSettings, InsertFailurePolicy, LineageConfig};
use crate::edge::Edge;
use crate::graph::ProvenanceGraph;
use crate::vertex::Vertex;
use super::schema::{self, ColumnName, SchemaManager, Table};
use super::{Direction, DirectionLabels};

/// A single `key:value` lookup condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub key: String,
    pub value: String,
}

impl Predicate {
    /// Parse `key:value` (or `key=value`); the first separator splits.
    pub fn parse(expression: &str) -> Result<Self> {
        let (key, value) = expression
            .split_once([':', '='])
            .ok_or_else(|| Error::InvalidPredicate(expression.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidPredicate(expression.to_string()));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// A VERTEX row turned back into a vertex.
#[derive(Debug, Clone)]
struct StoredVertex {
    hash: i64,
    vertex: Vertex,
}

/// An EDGE row with its endpoint hashes still unresolved.
#[derive(Debug, Clone)]
struct StoredEdge {
    kind: String,
    src_hash: i64,
    dst_hash: i64,
    annotations: BTreeMap<String, String>,
}

struct StoreState {
    conn: Connection,
    schema: SchemaManager,
}

/// Relational store for the provenance graph.
pub struct LineageStore {
    state: Mutex<Option<StoreState>>,
    directions: DirectionLabels,
    insert_failures: InsertFailurePolicy,
}

impl LineageStore {
    /// Connect according to `config.arguments` and create the tables.
    pub fn initialize(config: &LineageConfig) -> Result<Self> {
        let settings = ConnectionSettings::from_arguments(&config.arguments)?;
        if !settings.username.is_empty() || !settings.password.is_empty() {
            tracing::debug!("Credentials are ignored by the embedded engine");
        }

        let conn = if settings.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            ensure_db_dir(Path::new(&settings.url))?;
            Connection::open(&settings.url)?
        };
        tracing::info!("Lineage store opened at {}", settings.url);
        Self::from_connection(conn, config)
    }

    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        ensure_db_dir(path)?;
        let conn = Connection::open(path)?;
        Self::from_connection(conn, &LineageConfig::default())
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, &LineageConfig::default())
    }

    fn from_connection(conn: Connection, config: &LineageConfig) -> Result<Self> {
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        let mut schema = SchemaManager::new();
        schema.load_existing(&conn)?;

        Ok(Self {
            state: Mutex::new(Some(StoreState { conn, schema })),
            directions: DirectionLabels::new(&config.ancestors, &config.descendants),
            insert_failures: config.insert_failures,
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        let state = guard.as_mut().ok_or(Error::Closed)?;
        f(state)
    }

    fn settle(&self, result: Result<()>, what: &str) -> Result<()> {
        match (result, self.insert_failures) {
            (Ok(()), _) => Ok(()),
            (Err(e), InsertFailurePolicy::Log) => {
                tracing::error!("Failed to insert {}: {}", what, e);
                Ok(())
            }
            (Err(e), InsertFailurePolicy::Propagate) => Err(e),
        }
    }

    // ========== Write Operations ==========

    /// Insert one VERTEX row. Identical vertices produce separate rows that
    /// share a hash.
    pub fn insert_vertex(&self, vertex: &Vertex) -> Result<()> {
        let hash = vertex.content_hash().short();
        self.with_state(|state| {
            let result = state.insert_row(Table::Vertex, &vertex.kind, &[hash], &vertex.annotations);
            self.settle(result, "vertex")
        })
    }

    /// Insert one EDGE row keyed by the hashes of both endpoints.
    pub fn insert_edge(&self, edge: &Edge) -> Result<()> {
        let keys = [
            edge.content_hash().short(),
            edge.source.content_hash().short(),
            edge.destination.content_hash().short(),
        ];
        self.with_state(|state| {
            let result = state.insert_row(Table::Edge, &edge.kind, &keys, &edge.annotations);
            self.settle(result, "edge")
        })
    }

    /// Ensure an annotation column exists; returns true if it was created.
    pub fn add_column(&self, table: Table, key: &str) -> Result<bool> {
        let column = ColumnName::sanitize(key).ok_or_else(|| Error::InvalidColumn(key.to_string()))?;
        self.with_state(|state| {
            state.begin()?;
            state.schema.add_column(&state.conn, table, &column)
        })
    }

    /// Flush pending writes
    pub fn commit(&self) -> Result<()> {
        self.with_state(|state| state.commit())
    }

    /// Commit and release the connection. Later calls fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        let Some(state) = guard.take() else {
            return Ok(());
        };
        state.commit()?;
        state.conn.close().map_err(|(_, e)| Error::Storage(e))?;
        tracing::info!("Lineage store closed");
        Ok(())
    }

    // ========== Query Operations ==========

    /// All vertices matching a single `key:value` predicate.
    pub fn get_vertices(&self, expression: &str) -> Result<ProvenanceGraph> {
        let predicate = Predicate::parse(expression)?;
        self.with_state(|state| {
            state.commit()?;
            let mut graph = ProvenanceGraph::new();
            for stored in state.vertices_matching(&predicate)? {
                graph.add_vertex(stored.vertex);
            }
            Ok(graph)
        })
    }

    /// Breadth-first lineage walk from the vertex with row id `vertex_id`.
    ///
    /// Each content hash is expanded at most once, so cycles terminate.
    /// Vertices matching `terminating` are included but not expanded; the
    /// literal `null` means no terminating predicate.
    pub fn get_lineage(
        &self,
        vertex_id: i64,
        depth: u32,
        direction: &str,
        terminating: Option<&str>,
    ) -> Result<ProvenanceGraph> {
        let direction = self.directions.resolve(direction)?;
        let terminating = terminating
            .filter(|t| !t.trim().eq_ignore_ascii_case("null"))
            .map(Predicate::parse)
            .transpose()?;

        self.with_state(|state| {
            state.commit()?;
            let start = state
                .vertex_by_id(vertex_id)?
                .ok_or(Error::VertexNotFound(vertex_id))?;

            let stop: HashSet<i64> = match &terminating {
                Some(predicate) => state.hashes_matching(predicate)?,
                None => HashSet::new(),
            };

            let mut graph = ProvenanceGraph::new();
            graph.add_vertex(start.vertex.clone());

            let mut lookup: HashMap<i64, Vertex> = HashMap::new();
            lookup.insert(start.hash, start.vertex);

            let mut done: HashSet<i64> = HashSet::new();
            let mut frontier: BTreeSet<i64> = BTreeSet::from([start.hash]);
            let mut remaining = depth;

            while !frontier.is_empty() && remaining > 0 {
                done.extend(frontier.iter().copied());
                let mut next = BTreeSet::new();

                for hash in &frontier {
                    let Some(near) = lookup.get(hash).cloned() else {
                        continue;
                    };
                    for stored in state.edges_at(direction, *hash)? {
                        let far_hash = match direction {
                            Direction::Ancestors => stored.dst_hash,
                            Direction::Descendants => stored.src_hash,
                        };
                        let far = match lookup.get(&far_hash) {
                            Some(v) => v.clone(),
                            None => match state.vertex_by_hash(far_hash)? {
                                Some(found) => {
                                    lookup.insert(far_hash, found.vertex.clone());
                                    found.vertex
                                }
                                None => {
                                    tracing::warn!("Edge references unknown vertex hash {}", far_hash);
                                    continue;
                                }
                            },
                        };

                        let (source, destination) = match direction {
                            Direction::Ancestors => (near.clone(), far),
                            Direction::Descendants => (far, near.clone()),
                        };
                        graph.add_edge(Edge {
                            kind: stored.kind,
                            source,
                            destination,
                            annotations: stored.annotations,
                        });

                        if !done.contains(&far_hash) && !stop.contains(&far_hash) {
                            next.insert(far_hash);
                        }
                    }
                }

                frontier = next;
                remaining -= 1;
            }

            tracing::debug!(
                "Lineage of vertex {} ({:?}): {} vertices, {} edges",
                vertex_id,
                direction,
                graph.vertex_count(),
                graph.edge_count()
            );
            Ok(graph)
        })
    }

    // ========== Statistics ==========

    pub fn count_vertices(&self) -> Result<usize> {
        self.with_state(|state| state.count(Table::Vertex))
    }

    pub fn count_edges(&self) -> Result<usize> {
        self.with_state(|state| state.count(Table::Edge))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.with_state(|state| {
            Ok(StoreStats {
                vertices: state.count(Table::Vertex)?,
                edges: state.count(Table::Edge)?,
                vertex_columns: state.schema.dynamic_column_count(Table::Vertex),
                edge_columns: state.schema.dynamic_column_count(Table::Edge),
            })
        })
    }
}

impl StoreState {
    /// Writes run inside an explicit transaction that stays open until the
    /// next commit.
    fn begin(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn count(&self, table: Table) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.as_str()), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Make sure every annotation has a column and pair it with its value.
    fn annotation_columns<'a>(
        &mut self,
        table: Table,
        annotations: &'a BTreeMap<String, String>,
    ) -> Result<Vec<(ColumnName, &'a str)>> {
        let mut taken = HashSet::new();
        let mut columns = Vec::with_capacity(annotations.len());

        for (key, value) in annotations {
            if key.eq_ignore_ascii_case("type") {
                continue;
            }
            let Some(column) = ColumnName::sanitize(key) else {
                tracing::debug!("Annotation key {:?} has no usable characters", key);
                continue;
            };
            if column.is_reserved() {
                tracing::debug!("Annotation key {:?} maps to key column {}", key, column);
                continue;
            }
            if !taken.insert(column.as_str().to_ascii_lowercase()) {
                tracing::warn!("Annotation key {:?} collides with column {} on {}", key, column, table);
                continue;
            }
            self.schema.add_column(&self.conn, table, &column)?;
            columns.push((column, value.as_str()));
        }
        Ok(columns)
    }

    fn insert_row(
        &mut self,
        table: Table,
        kind: &str,
        keys: &[i64],
        annotations: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.begin()?;
        let columns = self.annotation_columns(table, annotations)?;

        let mut names: Vec<String> = table.key_columns()[1..].iter().map(|c| c.to_string()).collect();
        names.extend(columns.iter().map(|(c, _)| c.quoted()));

        let mut values: Vec<Value> = Vec::with_capacity(names.len());
        values.push(Value::Text(kind.to_string()));
        values.extend(keys.iter().map(|k| Value::Integer(*k)));
        values.extend(columns.iter().map(|(_, v)| Value::Text(v.to_string())));

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.as_str(),
            names.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Quoted column for a lookup key, or `None` if the table has no such
    /// column.
    fn resolve_column(&self, table: Table, key: &str) -> Option<String> {
        let column = ColumnName::sanitize(key)?;
        if let Some(fixed) = table
            .key_columns()
            .iter()
            .find(|c| c.eq_ignore_ascii_case(column.as_str()))
        {
            return Some(fixed.to_string());
        }
        self.schema.is_known(table, &column).then(|| column.quoted())
    }

    fn vertices_matching(&self, predicate: &Predicate) -> Result<Vec<StoredVertex>> {
        let Some(column) = self.resolve_column(Table::Vertex, &predicate.key) else {
            return Ok(Vec::new());
        };
        let sql = format!("SELECT * FROM VERTEX WHERE {} = ?1 ORDER BY vertexId", column);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let names = column_names(&stmt);
        let rows = stmt
            .query_map([&predicate.value], |row| row_to_vertex(row, &names))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn hashes_matching(&self, predicate: &Predicate) -> Result<HashSet<i64>> {
        let Some(column) = self.resolve_column(Table::Vertex, &predicate.key) else {
            return Ok(HashSet::new());
        };
        let sql = format!("SELECT hash FROM VERTEX WHERE {} = ?1", column);
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let hashes = stmt
            .query_map([&predicate.value], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(hashes)
    }

    fn vertex_by_id(&self, vertex_id: i64) -> Result<Option<StoredVertex>> {
        let mut stmt = self.conn.prepare_cached("SELECT * FROM VERTEX WHERE vertexId = ?1")?;
        let names = column_names(&stmt);
        stmt.query_row([vertex_id], |row| row_to_vertex(row, &names))
            .optional()
            .map_err(Into::into)
    }

    /// The lowest-numbered row carrying `hash`
    fn vertex_by_hash(&self, hash: i64) -> Result<Option<StoredVertex>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT * FROM VERTEX WHERE hash = ?1 ORDER BY vertexId LIMIT 1")?;
        let names = column_names(&stmt);
        stmt.query_row([hash], |row| row_to_vertex(row, &names))
            .optional()
            .map_err(Into::into)
    }

    /// Edges to expand from a frontier vertex: ancestors leave through the
    /// vertex as source, descendants arrive through it as destination.
    fn edges_at(&self, direction: Direction, hash: i64) -> Result<Vec<StoredEdge>> {
        let sql = match direction {
            Direction::Ancestors => "SELECT * FROM EDGE WHERE srcVertexHash = ?1 ORDER BY edgeId",
            Direction::Descendants => "SELECT * FROM EDGE WHERE dstVertexHash = ?1 ORDER BY edgeId",
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        let names = column_names(&stmt);
        let edges = stmt
            .query_map([hash], |row| row_to_edge(row, &names))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Text form of a stored value; NULL and empty strings count as absent.
fn value_text(value: ValueRef<'_>) -> Option<String> {
    let text = match value {
        ValueRef::Null => return None,
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    };
    (!text.is_empty()).then_some(text)
}

/// Helper to convert a VERTEX row: `vertexId` and `hash` become annotations.
fn row_to_vertex(row: &rusqlite::Row, names: &[String]) -> rusqlite::Result<StoredVertex> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let hash: i64 = row.get(2)?;

    let mut vertex = Vertex::new(kind);
    vertex.set(names[0].clone(), id.to_string());
    vertex.set(names[2].clone(), hash.to_string());
    for (i, name) in names.iter().enumerate().skip(3) {
        if let Some(value) = value_text(row.get_ref(i)?) {
            vertex.set(name.clone(), value);
        }
    }
    Ok(StoredVertex { hash, vertex })
}

/// Helper to convert an EDGE row: `edgeId` and `hash` become annotations,
/// the endpoint hashes do not.
fn row_to_edge(row: &rusqlite::Row, names: &[String]) -> rusqlite::Result<StoredEdge> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let hash: i64 = row.get(2)?;

    let mut annotations = BTreeMap::new();
    annotations.insert(names[0].clone(), id.to_string());
    annotations.insert(names[2].clone(), hash.to_string());
    for (i, name) in names.iter().enumerate().skip(5) {
        if let Some(value) = value_text(row.get_ref(i)?) {
            annotations.insert(name.clone(), value);
        }
    }
    Ok(StoredEdge {
        kind,
        src_hash: row.get(3)?,
        dst_hash: row.get(4)?,
        annotations,
    })
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub vertices: usize,
    pub edges: usize,
    pub vertex_columns: usize,
    pub edge_columns: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Vertices: {}", self.vertices)?;
        writeln!(f, "  Edges: {}", self.edges)?;
        writeln!(f, "  Vertex columns: {}", self.vertex_columns)?;
        writeln!(f, "  Edge columns: {}", self.edge_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{ARTIFACT, PROCESS};

    fn process(pid: &str) -> Vertex {
        Vertex::new(PROCESS).with("pid", pid).with("name", format!("proc{}", pid))
    }

    fn file(path: &str) -> Vertex {
        Vertex::new(ARTIFACT).with("subtype", "file").with("path", path)
    }

    fn id_of(store: &LineageStore, key: &str, value: &str) -> i64 {
        let graph = store.get_vertices(&format!("{}:{}", key, value)).unwrap();
        let vertex = graph.vertices().next().unwrap();
        vertex.annotation("vertexId").unwrap().parse().unwrap()
    }

    #[test]
    fn test_predicate_parse() {
        let p = Predicate::parse("path:/tmp/a:b").unwrap();
        assert_eq!(p.key, "path");
        assert_eq!(p.value, "/tmp/a:b");
        assert_eq!(Predicate::parse("pid=7").unwrap().value, "7");
        assert!(Predicate::parse("nothing").is_err());
        assert!(Predicate::parse(":x").is_err());
    }

    #[test]
    fn test_vertex_roundtrip() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("10")).unwrap();

        let graph = store.get_vertices("pid:10").unwrap();
        assert_eq!(graph.vertex_count(), 1);
        let vertex = graph.vertices().next().unwrap();
        assert_eq!(vertex.kind, PROCESS);
        assert_eq!(vertex.annotation("name"), Some("proc10"));
        assert_eq!(vertex.annotation("vertexId"), Some("1"));
        assert_eq!(
            vertex.annotation("hash"),
            Some(process("10").content_hash().short().to_string().as_str())
        );
    }

    #[test]
    fn test_duplicate_vertex_gets_new_row_same_hash() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("10")).unwrap();
        store.insert_vertex(&process("10")).unwrap();
        assert_eq!(store.count_vertices().unwrap(), 2);

        let graph = store.get_vertices("pid:10").unwrap();
        let mut hashes: Vec<_> = graph.vertices().map(|v| v.annotation("hash").unwrap().to_string()).collect();
        let ids: HashSet<_> = graph.vertices().map(|v| v.annotation("vertexId").unwrap().to_string()).collect();
        hashes.dedup();
        assert_eq!(hashes.len(), 1);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("1").with("cwd", "")).unwrap();
        // A later vertex adds a column the first row never had
        store.insert_vertex(&file("/a").with("version", "0")).unwrap();

        let graph = store.get_vertices("pid:1").unwrap();
        let vertex = graph.vertices().next().unwrap();
        assert!(vertex.annotation("cwd").is_none());
        assert!(vertex.annotation("version").is_none());
    }

    #[test]
    fn test_hostile_values_roundtrip() {
        let store = LineageStore::open_in_memory().unwrap();
        let nasty = "it's \"quoted\"; DROP TABLE VERTEX; --";
        store.insert_vertex(&file(nasty)).unwrap();

        let graph = store.get_vertices(&format!("path:{}", nasty)).unwrap();
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.vertices().next().unwrap().annotation("path"), Some(nasty));
        assert_eq!(store.count_vertices().unwrap(), 1);
    }

    #[test]
    fn test_unknown_column_lookup_is_empty() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("1")).unwrap();
        assert!(store.get_vertices("nosuchkey:1").unwrap().is_empty());
        assert_eq!(store.get_vertices("type:Process").unwrap().vertex_count(), 1);
    }

    #[test]
    fn test_add_column_twice() {
        let store = LineageStore::open_in_memory().unwrap();
        assert!(store.add_column(Table::Vertex, "source host").unwrap());
        assert!(!store.add_column(Table::Vertex, "source host").unwrap());
        assert!(!store.add_column(Table::Vertex, "sourcehost").unwrap());
        assert_eq!(store.stats().unwrap().vertex_columns, 1);
    }

    #[test]
    fn test_reserved_and_colliding_keys_are_skipped() {
        let store = LineageStore::open_in_memory().unwrap();
        let vertex = process("3").with("hash", "spoofed").with("source host", "a").with("sourcehost", "b");
        store.insert_vertex(&vertex).unwrap();

        let graph = store.get_vertices("pid:3").unwrap();
        let stored = graph.vertices().next().unwrap();
        assert_ne!(stored.annotation("hash"), Some("spoofed"));
        // "source host" sorts first and wins the column
        assert_eq!(stored.annotation("sourcehost"), Some("a"));
    }

    #[test]
    fn test_edge_insert() {
        let store = LineageStore::open_in_memory().unwrap();
        let edge = Edge::new("Used", process("1"), file("/etc/passwd"))
            .with("operation", "read")
            .with("time", "12.5");
        store.insert_edge(&edge).unwrap();
        assert_eq!(store.count_edges().unwrap(), 1);
        assert_eq!(store.stats().unwrap().edge_columns, 2);
    }

    #[test]
    fn test_lineage_descendants_and_ancestors() {
        let store = LineageStore::open_in_memory().unwrap();
        let (a, b, c) = (process("1"), process("2"), process("3"));
        for v in [&a, &b, &c] {
            store.insert_vertex(v).unwrap();
        }
        // b was triggered by a, c was triggered by b
        store.insert_edge(&Edge::new("WasTriggeredBy", b.clone(), a.clone()).with("operation", "fork")).unwrap();
        store.insert_edge(&Edge::new("WasTriggeredBy", c.clone(), b.clone()).with("operation", "fork")).unwrap();

        let a_id = id_of(&store, "pid", "1");
        let descendants = store.get_lineage(a_id, 5, "descendants", None).unwrap();
        assert_eq!(descendants.vertex_count(), 3);
        assert_eq!(descendants.edge_count(), 2);

        let one_hop = store.get_lineage(a_id, 1, "desc", None).unwrap();
        assert_eq!(one_hop.vertex_count(), 2);

        let c_id = id_of(&store, "pid", "3");
        let ancestors = store.get_lineage(c_id, 5, "a", Some("null")).unwrap();
        assert_eq!(ancestors.vertex_count(), 3);
        let edge = ancestors.edges().next().unwrap();
        assert!(edge.annotation("edgeId").is_some());
        assert!(edge.annotation("srcVertexHash").is_none());
        assert_eq!(edge.annotation("operation"), Some("fork"));
    }

    #[test]
    fn test_lineage_cycle_terminates() {
        let store = LineageStore::open_in_memory().unwrap();
        let (a, b) = (process("1"), process("2"));
        store.insert_vertex(&a).unwrap();
        store.insert_vertex(&b).unwrap();
        store.insert_edge(&Edge::new("WasTriggeredBy", b.clone(), a.clone()).with("operation", "fork")).unwrap();
        store.insert_edge(&Edge::new("WasTriggeredBy", a.clone(), b.clone()).with("operation", "fork")).unwrap();

        let a_id = id_of(&store, "pid", "1");
        for direction in ["descendants", "ancestors"] {
            let lineage = store.get_lineage(a_id, 1000, direction, None).unwrap();
            assert_eq!(lineage.vertex_count(), 2);
            assert_eq!(lineage.edge_count(), 2);
        }
    }

    #[test]
    fn test_lineage_stops_at_terminating_set() {
        let store = LineageStore::open_in_memory().unwrap();
        let chain = [process("1"), process("2"), process("3"), process("4")];
        for v in &chain {
            store.insert_vertex(v).unwrap();
        }
        // each process was triggered by the one before it
        for pair in chain.windows(2) {
            store
                .insert_edge(&Edge::new("WasTriggeredBy", pair[1].clone(), pair[0].clone()).with("operation", "fork"))
                .unwrap();
        }

        let root = id_of(&store, "pid", "1");
        let lineage = store.get_lineage(root, 10, "descendants", Some("pid:3")).unwrap();
        assert_eq!(lineage.vertex_count(), 3);
        assert_eq!(lineage.edge_count(), 2);
        assert_eq!(lineage.find_vertices("pid", "3").len(), 1);
        assert!(lineage.find_vertices("pid", "4").is_empty());

        let unbounded = store.get_lineage(root, 10, "descendants", Some("null")).unwrap();
        assert_eq!(unbounded.vertex_count(), 4);
    }

    #[test]
    fn test_lookup_sees_columns_added_later() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("1")).unwrap();
        let before = store.get_vertices("pid:1").unwrap();
        assert!(before.vertices().all(|v| v.annotation("exe").is_none()));

        store.insert_vertex(&process("1").with("exe", "/bin/sh")).unwrap();
        let after = store.get_vertices("pid:1").unwrap();
        assert_eq!(after.vertex_count(), 2);
        assert_eq!(after.find_vertices("exe", "/bin/sh").len(), 1);

        let id = id_of(&store, "exe", "/bin/sh");
        let lineage = store.get_lineage(id, 1, "ancestors", None).unwrap();
        assert_eq!(lineage.vertices().next().unwrap().annotation("exe"), Some("/bin/sh"));
    }

    #[test]
    fn test_lineage_is_read_only() {
        let store = LineageStore::open_in_memory().unwrap();
        let (a, b) = (process("1"), process("2"));
        store.insert_vertex(&a).unwrap();
        store.insert_vertex(&b).unwrap();
        store.insert_edge(&Edge::new("WasTriggeredBy", b, a)).unwrap();

        let id = id_of(&store, "pid", "1");
        store.get_lineage(id, 3, "descendants", None).unwrap();
        store.get_lineage(id, 3, "ancestors", None).unwrap();
        assert_eq!(store.count_edges().unwrap(), 1);
    }

    #[test]
    fn test_lineage_bad_arguments() {
        let store = LineageStore::open_in_memory().unwrap();
        store.insert_vertex(&process("1")).unwrap();
        assert!(matches!(store.get_lineage(1, 1, "sideways", None), Err(Error::InvalidDirection(_))));
        assert!(matches!(store.get_lineage(1, 1, "", None), Err(Error::InvalidDirection(_))));
        assert!(matches!(store.get_lineage(99, 1, "ancestors", None), Err(Error::VertexNotFound(99))));
    }

    #[test]
    fn test_closed_store_rejects_calls() {
        let store = LineageStore::open_in_memory().unwrap();
        store.close().unwrap();
        assert!(store.close().is_ok());
        assert!(matches!(store.insert_vertex(&process("1")), Err(Error::Closed)));
    }

    #[test]
    fn test_propagate_policy_surfaces_insert_errors() {
        let config = LineageConfig {
            insert_failures: InsertFailurePolicy::Propagate,
            ..LineageConfig::in_memory()
        };
        let store = LineageStore::initialize(&config).unwrap();
        store
            .with_state(|state| {
                state.conn.execute_batch("DROP TABLE VERTEX")?;
                Ok(())
            })
            .unwrap();
        assert!(store.insert_vertex(&process("1")).is_err());

        let lenient = LineageStore::open_in_memory().unwrap();
        lenient
            .with_state(|state| {
                state.conn.execute_batch("DROP TABLE VERTEX")?;
                Ok(())
            })
            .unwrap();
        assert!(lenient.insert_vertex(&process("1")).is_ok());
    }

    #[test]
    fn test_reopen_keeps_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lineage").join("store.sqlite");
        let config = LineageConfig::with_arguments(format!("sqlite {} null null", path.display()));

        let store = LineageStore::initialize(&config).unwrap();
        store.insert_vertex(&process("5").with("exe", "/bin/sh")).unwrap();
        store.insert_edge(&Edge::new("Used", process("5"), file("/etc/hosts"))).unwrap();
        store.close().unwrap();
        assert!(path.exists());

        let reopened = LineageStore::initialize(&config).unwrap();
        assert!(!reopened.add_column(Table::Vertex, "exe").unwrap());
        assert_eq!(reopened.count_vertices().unwrap(), 1);
        assert_eq!(reopened.count_edges().unwrap(), 1);
        let graph = reopened.get_vertices("exe:/bin/sh").unwrap();
        assert_eq!(graph.vertex_count(), 1);
        reopened.close().unwrap();
    }
}
