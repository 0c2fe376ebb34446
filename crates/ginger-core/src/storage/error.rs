//! Storage errors
//!
//! One enum covers the database, the record codec and the preference file.
//! Domain operations wrap these in `anyhow` context; callers that need the
//! kind back use `downcast_ref::<StorageError>()`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::schema::Collection;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The database file cannot be opened or its schema cannot be created
    #[error("Storage unavailable at '{path}': {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Cannot create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Access to '{path}' was refused: {source}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Out of space writing '{path}': {source}")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The temp file was written but could not replace the target
    #[error("Cannot move '{from}' over '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Insert collided with an existing primary key
    #[error("Duplicate key {key} in '{collection}'")]
    DuplicateKey { collection: Collection, key: i64 },

    /// A record the operation depends on does not exist
    #[error("No record with key {key} in '{collection}'")]
    NotFound { collection: Collection, key: i64 },

    /// The collection has no index with this name
    #[error("Collection '{collection}' has no index '{index}'")]
    UnknownIndex {
        collection: Collection,
        index: String,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Classify a filesystem failure on `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied { path, source: error }
        } else if out_of_space(&error) {
            StorageError::DiskFull { path, source: error }
        } else {
            StorageError::WriteError { path, source: error }
        }
    }

    /// Map a failed insert, turning constraint violations into `DuplicateKey`
    pub(crate) fn from_insert(error: rusqlite::Error, collection: Collection, key: i64) -> Self {
        match error {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateKey { collection, key }
            }
            other => StorageError::Database(other),
        }
    }

    /// Whether retrying after user action can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::DiskFull { .. }
                | StorageError::PermissionDenied { .. }
                | StorageError::DuplicateKey { .. }
        )
    }

    /// Hint to show next to the error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        let hint = match self {
            StorageError::Unavailable { .. } => {
                "Make sure the data directory is writable and ginger.db is not locked or damaged."
            }
            StorageError::CreateDirectory { .. } | StorageError::PermissionDenied { .. } => {
                "Fix the permissions on the data directory, or point GINGER_DATA_DIR elsewhere."
            }
            StorageError::DiskFull { .. } => "Free some disk space, then retry.",
            StorageError::DuplicateKey { .. } => "Retry the operation.",
            _ => return None,
        };
        Some(hint)
    }
}

/// ENOSPC, or a message saying as much on platforms without the code
fn out_of_space(error: &io::Error) -> bool {
    const ENOSPC: i32 = 28;
    if error.raw_os_error() == Some(ENOSPC) {
        return true;
    }
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
