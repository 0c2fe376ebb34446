//! Ginger Core Library
//!
//! This crate provides the persistence layer for Ginger, a local writing
//! application: books hold rolls (volumes), rolls hold chapters, chapters
//! keep a bounded revision history, and books carry free-form notes.
//!
//! # Architecture
//!
//! - **SQLite**: one table per record kind, each record stored as JSON next
//!   to its primary key and secondary index columns
//!
//! Every domain operation runs in a single transaction.
//!
//! # Quick Start
//!
//! ```text
//! let mut store = Store::open()?;
//!
//! // Add a book; it starts with one roll and one empty chapter
//! let book = store.create_book(BookFields::named("Dune"))?;
//!
//! // Edit the first chapter, recording history
//! let detail = store.get_book_detail(book.bid)?.context("book vanished")?;
//! let cid = detail.rolls[0].chapters[0].cid;
//! store.set_chapter_value(cid, "In the week before their departure...")?;
//! ```
//!
//! # Modules
//!
//! - `store`: Unified storage interface (main entry point)
//! - `models`: Records for books, rolls, chapters, history and notes
//! - `history`: Chapter history retention policy
//! - `clock`: Time source and primary key allocation
//! - `storage`: SQLite gateway and the preference blob
//! - `config`: Application configuration

pub mod clock;
pub mod config;
pub mod history;
pub mod models;
pub mod storage;
pub mod store;

pub use clock::{Clock, IdAllocator, ManualClock, SystemClock};
pub use config::Config;
pub use history::{HistoryPolicy, Retention};
pub use models::{
    Book, BookDetail, BookFields, BookId, Chapter, ChapterId, History, HistoryId, Note, NoteId,
    Roll, RollDetail, RollId,
};
pub use storage::{Collection, Gateway, PreferenceStore, StorageError, StorageResult};
pub use store::{BookSort, Inconsistency, Store};
