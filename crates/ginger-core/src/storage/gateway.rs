//! Schema-aware access to the record collections
//!
//! The [`Gateway`] owns the SQLite connection. All reads and writes go
//! through a [`Records`] handle, which offers the same small set of
//! primitives for every collection: insert, upsert, lookup by primary key,
//! lookup by secondary index, and the matching deletes.
//!
//! Multi-record work is wrapped in [`Gateway::transaction`], which commits
//! only if the closure succeeds.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use serde_json::Value as JsonValue;
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::schema::{init_schema, needs_init, Collection, Record};

/// Upper bound on bound parameters per bulk delete statement
const DELETE_CHUNK: usize = 500;

/// Handle to the opened database
pub struct Gateway {
    conn: Connection,
}

impl Gateway {
    /// Open (or create) the database at `path`
    ///
    /// Missing tables and indexes are created on first run or when the
    /// stored schema version is older than [`super::SCHEMA_VERSION`].
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| StorageError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::prepare(conn, path)
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Unavailable {
            path: ":memory:".into(),
            source,
        })?;
        Self::prepare(conn, Path::new(":memory:"))
    }

    fn prepare(conn: Connection, path: &Path) -> StorageResult<Self> {
        if needs_init(&conn) {
            debug!("Initializing schema at {:?}", path);
            init_schema(&conn).map_err(|source| StorageError::Unavailable {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { conn })
    }

    /// Records handle outside any explicit transaction
    ///
    /// Each call commits on its own; use [`Gateway::transaction`] to group
    /// writes.
    pub fn records(&self) -> Records<'_> {
        Records { conn: &self.conn }
    }

    /// Run `f` inside one read-write transaction
    ///
    /// Commits when `f` returns `Ok`; any error rolls back every write made
    /// through the handle.
    pub fn transaction<T, E>(&mut self, f: impl FnOnce(&Records<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let out = f(&Records { conn: &tx })?;
        tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }

    /// Largest primary key present in any collection, or 0 when empty
    pub fn max_key(&self) -> StorageResult<i64> {
        let mut max = 0;
        for collection in Collection::ALL {
            let sql = format!(
                "SELECT COALESCE(MAX(\"{key}\"), 0) FROM \"{table}\"",
                key = collection.key_path(),
                table = collection.name()
            );
            let key: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
            max = max.max(key);
        }
        Ok(max)
    }
}

/// Collection primitives bound to a connection or an open transaction
#[derive(Clone, Copy)]
pub struct Records<'c> {
    conn: &'c Connection,
}

impl<'c> Records<'c> {
    /// Add a new record; fails with `DuplicateKey` if the key is taken
    pub fn insert<R: Record>(&self, record: &R) -> StorageResult<()> {
        let (sql, values) = write_statement("INSERT", record)?;
        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| StorageError::from_insert(e, R::COLLECTION, record.key()))?;
        Ok(())
    }

    /// Replace the record with the same key, or insert it
    pub fn upsert<R: Record>(&self, record: &R) -> StorageResult<()> {
        let (sql, values) = write_statement("INSERT OR REPLACE", record)?;
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    /// Look up one record by primary key
    pub fn get<R: Record>(&self, key: i64) -> StorageResult<Option<R>> {
        let collection = R::COLLECTION;
        let sql = format!(
            "SELECT data FROM \"{}\" WHERE \"{}\" = ?1",
            collection.name(),
            collection.key_path()
        );
        let data: Option<String> = self
            .conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()?;

        data.map(|d| decode(&d)).transpose()
    }

    /// Look up a record that must exist
    pub fn get_existing<R: Record>(&self, key: i64) -> StorageResult<R> {
        self.get(key)?.ok_or(StorageError::NotFound {
            collection: R::COLLECTION,
            key,
        })
    }

    /// Every record in the collection, in key order
    pub fn get_all<R: Record>(&self) -> StorageResult<Vec<R>> {
        let collection = R::COLLECTION;
        let sql = format!(
            "SELECT data FROM \"{}\" ORDER BY \"{}\"",
            collection.name(),
            collection.key_path()
        );
        self.query_records(&sql, [])
    }

    /// Every record whose indexed field equals `value`
    ///
    /// Rows come back in primary-key order within the index value, the same
    /// order an index cursor walks them.
    pub fn get_all_by_index<R: Record>(&self, index: &str, value: impl ToSql) -> StorageResult<Vec<R>> {
        let collection = checked_index::<R>(index)?;
        let sql = format!(
            "SELECT data FROM \"{}\" WHERE \"{}\" = ?1 ORDER BY \"{}\"",
            collection.name(),
            index,
            collection.key_path()
        );
        self.query_records(&sql, [value])
    }

    /// Remove one record; returns whether anything was removed
    pub fn delete<R: Record>(&self, key: i64) -> StorageResult<bool> {
        let collection = R::COLLECTION;
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            collection.name(),
            collection.key_path()
        );
        Ok(self.conn.execute(&sql, [key])? > 0)
    }

    /// Remove every record whose indexed field equals `value`
    pub fn delete_all_by_index<R: Record>(&self, index: &str, value: impl ToSql) -> StorageResult<usize> {
        let collection = checked_index::<R>(index)?;
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            collection.name(),
            index
        );
        Ok(self.conn.execute(&sql, [value])?)
    }

    /// Remove every record whose `field` is one of `values`
    ///
    /// Scans the whole collection, so `field` need not be indexed.
    pub fn delete_all_by_key_set<R: Record>(&self, field: &str, values: &[i64]) -> StorageResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }

        let collection = R::COLLECTION;
        let wanted: HashSet<i64> = values.iter().copied().collect();

        let sql = format!(
            "SELECT \"{}\", data FROM \"{}\"",
            collection.key_path(),
            collection.name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut doomed = Vec::new();
        for (key, data) in rows {
            let json: JsonValue = serde_json::from_str(&data)?;
            if json.get(field).and_then(JsonValue::as_i64).is_some_and(|v| wanted.contains(&v)) {
                doomed.push(key);
            }
        }

        let mut removed = 0;
        for chunk in doomed.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM \"{}\" WHERE \"{}\" IN ({})",
                collection.name(),
                collection.key_path(),
                placeholders
            );
            removed += self.conn.execute(&sql, params_from_iter(chunk))?;
        }
        Ok(removed)
    }

    /// Number of records in the collection
    pub fn count<R: Record>(&self) -> StorageResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", R::COLLECTION.name());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn query_records<R: Record, P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<Vec<R>> {
        let mut stmt = self.conn.prepare(sql)?;
        let data = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        data.iter().map(|d| decode(d)).collect()
    }
}

// ==================== Private helpers ====================

fn checked_index<R: Record>(index: &str) -> StorageResult<Collection> {
    let collection = R::COLLECTION;
    if collection.has_index(index) {
        Ok(collection)
    } else {
        Err(StorageError::UnknownIndex {
            collection,
            index: index.to_string(),
        })
    }
}

fn decode<R: Record>(data: &str) -> StorageResult<R> {
    Ok(serde_json::from_str(data)?)
}

/// Build an insert statement with the key, index columns and JSON body
fn write_statement<R: Record>(verb: &str, record: &R) -> StorageResult<(String, Vec<SqlValue>)> {
    let collection = R::COLLECTION;
    let json = serde_json::to_value(record)?;

    let mut columns = vec![collection.key_path()];
    let mut values = vec![SqlValue::Integer(record.key())];
    for index in collection.indexes() {
        columns.push(*index);
        values.push(json.get(*index).map(json_to_sql).unwrap_or(SqlValue::Null));
    }
    columns.push("data");
    values.push(SqlValue::Text(json.to_string()));

    let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "{verb} INTO \"{}\" ({}) VALUES ({})",
        collection.name(),
        quoted.join(", "),
        placeholders
    );
    Ok((sql, values))
}

/// Index columns hold JSON scalars; composite values are kept as JSON text
fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
