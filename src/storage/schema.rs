//! Database schema definitions and the dynamic column manager
//!
//! Both tables start with a fixed prefix of key columns. Every annotation key
//! seen on a record kind becomes a nullable text column of that table the
//! first time it is seen; columns are never dropped.

use std::collections::HashSet;
use rusqlite::Connection;
use crate::{Error, Result};

/// SQL to create the vertex table
pub const CREATE_VERTEX_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS VERTEX (
    vertexId INTEGER PRIMARY KEY AUTOINCREMENT,
    type VARCHAR(32) NOT NULL,
    hash INTEGER NOT NULL
)
"#;

/// SQL to create the edge table
pub const CREATE_EDGE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS EDGE (
    edgeId INTEGER PRIMARY KEY AUTOINCREMENT,
    type VARCHAR(32) NOT NULL,
    hash INTEGER NOT NULL,
    srcVertexHash INTEGER NOT NULL,
    dstVertexHash INTEGER NOT NULL
)
"#;

/// SQL to create indexes used by lookups and lineage traversal
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_vertex_hash ON VERTEX(hash)",
    "CREATE INDEX IF NOT EXISTS idx_edge_src ON EDGE(srcVertexHash)",
    "CREATE INDEX IF NOT EXISTS idx_edge_dst ON EDGE(dstVertexHash)",
];

/// Width of every dynamic annotation column
pub const ANNOTATION_COLUMN_TYPE: &str = "VARCHAR(256)";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_VERTEX_TABLE, CREATE_EDGE_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// The two record tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Vertex,
    Edge,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Vertex => "VERTEX",
            Table::Edge => "EDGE",
        }
    }

    /// Fixed key columns, in table order
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Vertex => &["vertexId", "type", "hash"],
            Table::Edge => &["edgeId", "type", "hash", "srcVertexHash", "dstVertexHash"],
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column names no annotation may take over, on either table
const RESERVED_COLUMNS: &[&str] = &["vertexid", "edgeid", "type", "hash", "srcvertexhash", "dstvertexhash"];

/// A validated SQL column identifier: non-empty, `[A-Za-z0-9]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(String);

impl ColumnName {
    /// Strip every character outside `[A-Za-z0-9]`; `None` if nothing is left.
    pub fn sanitize(key: &str) -> Option<Self> {
        let cleaned: String = key.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned))
        }
    }

    /// Accept a name only if it is already a valid identifier.
    pub fn parse(name: &str) -> Result<Self> {
        match Self::sanitize(name) {
            Some(column) if column.0 == name => Ok(column),
            _ => Err(Error::InvalidColumn(name.to_string())),
        }
    }

    /// Whether this collides with a fixed key column (SQLite compares
    /// identifiers case-insensitively)
    pub fn is_reserved(&self) -> bool {
        RESERVED_COLUMNS.contains(&self.folded().as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier in quoted form for statement text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    fn folded(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl std::fmt::Display for ColumnName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks which annotation columns already exist on each table.
#[derive(Debug, Default)]
pub struct SchemaManager {
    vertex_columns: HashSet<String>,
    edge_columns: HashSet<String>,
}

impl SchemaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the known-column sets from tables that already exist on disk
    pub fn load_existing(&mut self, conn: &Connection) -> Result<()> {
        for table in [Table::Vertex, Table::Edge] {
            for column in existing_columns(conn, table)? {
                self.known_mut(table).insert(column.to_ascii_lowercase());
            }
        }
        Ok(())
    }

    pub fn is_known(&self, table: Table, column: &ColumnName) -> bool {
        self.known(table).contains(&column.folded())
    }

    /// Number of dynamic columns on a table
    pub fn dynamic_column_count(&self, table: Table) -> usize {
        self.known(table)
            .iter()
            .filter(|c| !RESERVED_COLUMNS.contains(&c.as_str()))
            .count()
    }

    /// Ensure `column` exists on `table`.
    ///
    /// Returns `true` when this call created the column. A "duplicate column"
    /// failure from the backend means another writer got there first and
    /// counts as success.
    pub fn add_column(&mut self, conn: &Connection, table: Table, column: &ColumnName) -> Result<bool> {
        if self.is_known(table, column) {
            return Ok(false);
        }
        if column.is_reserved() {
            return Err(Error::InvalidColumn(column.to_string()));
        }

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table.as_str(),
            column.quoted(),
            ANNOTATION_COLUMN_TYPE
        );
        match conn.execute(&sql, []) {
            Ok(_) => {
                tracing::debug!("Added column {} to {}", column, table);
                // cached SELECT * statements still carry the old column list
                conn.flush_prepared_statement_cache();
                self.known_mut(table).insert(column.folded());
                Ok(true)
            }
            Err(e) if is_duplicate_column(&e) => {
                tracing::debug!("Column {} already present on {}", column, table);
                conn.flush_prepared_statement_cache();
                self.known_mut(table).insert(column.folded());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn known(&self, table: Table) -> &HashSet<String> {
        match table {
            Table::Vertex => &self.vertex_columns,
            Table::Edge => &self.edge_columns,
        }
    }

    fn known_mut(&mut self, table: Table) -> &mut HashSet<String> {
        match table {
            Table::Vertex => &mut self.vertex_columns,
            Table::Edge => &mut self.edge_columns,
        }
    }
}

/// Column names of a table as the backend reports them
pub fn existing_columns(conn: &Connection, table: Table) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table.as_str()))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn is_duplicate_column(error: &rusqlite::Error) -> bool {
    matches!(error, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("duplicate column name"))
}
