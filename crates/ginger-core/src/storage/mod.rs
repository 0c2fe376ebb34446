//! Storage layer
//!
//! Five record collections in one SQLite database, plus the preference blob.
//!
//! ## Architecture
//!
//! - **Schema**: collection declarations (primary key, secondary indexes)
//! - **Gateway**: generic insert/upsert/get/delete primitives and transactions
//! - **Preferences**: a single JSON entry of UI memory, written atomically

pub mod error;
pub mod gateway;
pub mod preferences;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use gateway::{Gateway, Records};
pub use preferences::PreferenceStore;
pub use schema::{init_schema, needs_init, Collection, Record, SCHEMA_VERSION};
