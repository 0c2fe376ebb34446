//! Preference blob persistence
//!
//! A single named entry holding free-form UI memory (last opened book,
//! scroll position and so on) as JSON text.
//!
//! File: `ginger-memory.json` in the data directory (see `Config`).

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::error::{StorageError, StorageResult};

/// Reads and writes the preference blob
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the stored memory
    ///
    /// Returns an empty object when nothing has been saved yet.
    pub fn load_memory(&self) -> StorageResult<Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(empty()),
            Err(source) => {
                return Err(StorageError::ReadError {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(empty());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the memory
    ///
    /// Strings are stored verbatim; any other value is serialized to JSON.
    pub fn save_memory(&self, value: &Value) -> StorageResult<()> {
        let text = match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        };

        debug!("Saving preference blob to {:?}", self.path);
        atomic_write(&self.path, text.as_bytes())
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> PreferenceStore {
        PreferenceStore::new(temp_dir.path().join("ginger-memory.json"))
    }

    #[test]
    fn test_missing_blob_is_empty_object() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = store(&temp_dir);

        assert_eq!(prefs.load_memory().unwrap(), json!({}));
    }

    #[test]
    fn test_save_and_load_object() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = store(&temp_dir);

        let memory = json!({ "lastBook": 1700000000000_i64, "scroll": 420 });
        prefs.save_memory(&memory).unwrap();

        assert_eq!(prefs.load_memory().unwrap(), memory);
    }

    #[test]
    fn test_string_is_stored_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = store(&temp_dir);

        prefs
            .save_memory(&Value::String(r#"{"theme":"dark"}"#.into()))
            .unwrap();

        let raw = fs::read_to_string(&prefs.path).unwrap();
        assert_eq!(raw, r#"{"theme":"dark"}"#);
        assert_eq!(prefs.load_memory().unwrap(), json!({ "theme": "dark" }));
    }

    #[test]
    fn test_empty_file_is_empty_object() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = store(&temp_dir);
        fs::write(&prefs.path, "  \n").unwrap();

        assert_eq!(prefs.load_memory().unwrap(), json!({}));
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let prefs = store(&temp_dir);
        fs::write(&prefs.path, "{not json").unwrap();

        let err = prefs.load_memory().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("a").join("b").join("file.json");

        atomic_write(&nested_path, b"test data").unwrap();

        assert_eq!(fs::read_to_string(&nested_path).unwrap(), "test data");
        assert!(!nested_path.with_extension("tmp").exists());
    }
}
