//! SQLite schema for the record collections
//!
//! Each collection is a table keyed by an integer primary key, with one
//! column per secondary (non-unique) index and the full record serialized
//! as JSON in `data`. Index columns are copied out of the JSON on every
//! write, so they are only ever lookup accelerators.

use rusqlite::{Connection, OptionalExtension, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// The fixed set of record collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Books,
    Rolls,
    Chapters,
    History,
    Notes,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Books,
        Collection::Rolls,
        Collection::Chapters,
        Collection::History,
        Collection::Notes,
    ];

    /// Table name
    pub fn name(self) -> &'static str {
        match self {
            Collection::Books => "books",
            Collection::Rolls => "rolls",
            Collection::Chapters => "chapters",
            Collection::History => "history",
            Collection::Notes => "notes",
        }
    }

    /// Record field holding the primary key
    pub fn key_path(self) -> &'static str {
        match self {
            Collection::Books => "bid",
            Collection::Rolls => "rid",
            Collection::Chapters => "cid",
            Collection::History => "hid",
            Collection::Notes => "nid",
        }
    }

    /// Record fields with a secondary index
    pub fn indexes(self) -> &'static [&'static str] {
        match self {
            Collection::Books => &["name", "process", "del"],
            Collection::Rolls => &["bid", "name"],
            Collection::Chapters => &["rid", "name"],
            Collection::History => &["cid"],
            Collection::Notes => &["bid"],
        }
    }

    pub fn has_index(self, index: &str) -> bool {
        self.indexes().contains(&index)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record that lives in one of the collections
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    /// Primary key value
    fn key(&self) -> i64;
}

/// Initialize the database schema
///
/// Idempotent: only missing tables and indexes are created.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;

    for collection in Collection::ALL {
        conn.execute_batch(&collection_ddl(collection))?;
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Table and index statements for one collection
fn collection_ddl(collection: Collection) -> String {
    let table = collection.name();
    let mut columns = vec![format!("\"{}\" INTEGER PRIMARY KEY", collection.key_path())];
    // Index columns are untyped so they keep whatever JSON scalar the record holds
    columns.extend(collection.indexes().iter().map(|index| format!("\"{index}\"")));
    columns.push("data TEXT NOT NULL".to_string());

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (\n    {}\n);\n",
        columns.join(",\n    ")
    );
    for index in collection.indexes() {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_{index}\" ON \"{table}\"(\"{index}\");\n"
        ));
    }
    ddl
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_info WHERE key = 'version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    Ok(version.and_then(|v| v.parse().ok()))
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
