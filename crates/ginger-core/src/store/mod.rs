//! Unified storage interface
//!
//! The `Store` composes the gateway primitives into book, roll, chapter,
//! history and note operations that keep the records consistent:
//!
//! - children are inserted before their parents and deleted before them
//! - any change below a book refreshes the `mtime` of every ancestor
//! - a roll's `chapters` list and a book's `rolls` list track the child rows
//!
//! Each operation runs in a single transaction, so a failure part way
//! through leaves nothing behind.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = Store::open()?;
//!
//! let book = store.create_book(BookFields::named("Dune"))?;
//! let detail = store.get_book_detail(book.bid)?;
//! ```

mod books;
mod chapters;
mod consistency;
mod notes;
mod rolls;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::clock::{Clock, IdAllocator, SystemClock};
use crate::config::Config;
use crate::history::HistoryPolicy;
use crate::models::{Book, BookId, Roll};
use crate::storage::{Gateway, PreferenceStore, Records, StorageResult};

pub use books::BookSort;
pub use consistency::Inconsistency;

/// Unified storage interface for Ginger
pub struct Store {
    /// Record collections
    gateway: Gateway,
    /// UI memory blob
    preferences: PreferenceStore,
    /// Time source for ctime/mtime stamps
    clock: Arc<dyn Clock>,
    /// Primary key generator
    ids: IdAllocator,
    /// Chapter history limits
    policy: HistoryPolicy,
}

impl Store {
    /// Open the store using the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the store with a specific configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open the store with a specific configuration and time source
    pub fn open_with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = config.sqlite_path();
        let gateway = Gateway::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        let ids = IdAllocator::seeded(gateway.max_key().context("Failed to read existing keys")?);
        let preferences = PreferenceStore::new(config.memory_path());
        let policy = config.history_policy();

        info!("Opened store at {:?}", path);

        Ok(Self {
            gateway,
            preferences,
            clock,
            ids,
            policy,
        })
    }

    /// Get the history retention policy in effect
    pub fn history_policy(&self) -> HistoryPolicy {
        self.policy
    }

    /// Collection primitives outside any transaction, for reads
    pub(crate) fn records(&self) -> Records<'_> {
        self.gateway.records()
    }

    // ==================== Preferences ====================

    /// Load the UI memory blob; `{}` when nothing is stored
    pub fn load_memory(&self) -> Result<Value> {
        self.preferences
            .load_memory()
            .context("Failed to load preferences")
    }

    /// Save the UI memory blob
    pub fn save_memory(&self, value: &Value) -> Result<()> {
        self.preferences
            .save_memory(value)
            .context("Failed to save preferences")
    }

    // ==================== Private helpers ====================

    /// Current time and a fresh key for a record created now
    fn stamp(&mut self) -> (DateTime<Utc>, i64) {
        let now = self.clock.now();
        (now, self.ids.next(now))
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Stamp a book with `now` and persist it
fn touch_book(records: &Records<'_>, bid: BookId, now: DateTime<Utc>) -> StorageResult<Book> {
    let mut book: Book = records.get_existing(bid)?;
    book.touch(now);
    records.upsert(&book)?;
    Ok(book)
}

/// Stamp a roll and its book with `now` and persist both
fn touch_roll_and_book(records: &Records<'_>, roll: &mut Roll, now: DateTime<Utc>) -> StorageResult<()> {
    roll.touch(now);
    records.upsert(&*roll)?;
    touch_book(records, roll.bid, now)?;
    Ok(())
}

/// Order `rows` by their position in `order`
///
/// Rows missing from `order` keep their fetch order after the listed ones.
fn order_by_list<T>(rows: Vec<T>, order: &[i64], key: impl Fn(&T) -> i64) -> Vec<T> {
    let (mut listed, unlisted): (Vec<T>, Vec<T>) =
        rows.into_iter().partition(|row| order.contains(&key(row)));
    listed.sort_by_key(|row| order.iter().position(|id| *id == key(row)));
    listed.extend(unlisted);
    listed
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    pub fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    /// A store on a temp dir with a clock stopped at 2024-03-09 10:00 UTC
    pub fn test_store() -> (TempDir, ManualClock, Store) {
        let temp_dir = TempDir::new().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap());
        let store =
            Store::open_with_clock(test_config(&temp_dir), Arc::new(clock.clone())).unwrap();
        (temp_dir, clock, store)
    }
}
