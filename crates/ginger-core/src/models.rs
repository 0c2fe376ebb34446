//! Data models for Ginger
//!
//! Five record kinds with a fixed shape: a book owns rolls (volumes), a roll
//! owns chapters, a chapter owns its revision history, and a book owns notes.
//! Records serialize to the JSON stored in each collection's `data` column;
//! timestamps are stored as milliseconds since the Unix epoch.

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Collection, Record};

pub type BookId = i64;
pub type RollId = i64;
pub type ChapterId = i64;
pub type HistoryId = i64;
pub type NoteId = i64;

/// Name given to the roll created alongside a new book
pub const DEFAULT_ROLL_NAME: &str = "Volume 1";
/// Name given to the chapter created alongside a new roll
pub const DEFAULT_CHAPTER_NAME: &str = "Chapter 1";

/// Editable book fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookFields {
    pub name: String,
    pub thumb: String,
    pub process: String,
}

impl BookFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A book, the top-level document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub bid: BookId,
    pub name: String,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub process: String,
    /// Soft-delete flag, stored as 0/1
    #[serde(with = "del_flag")]
    pub del: bool,
    #[serde(with = "ts_milliseconds")]
    pub ctime: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub mtime: DateTime<Utc>,
    /// Owned roll ids in display order
    #[serde(default)]
    pub rolls: Vec<RollId>,
}

impl Book {
    pub fn new(bid: BookId, fields: BookFields, now: DateTime<Utc>) -> Self {
        Self {
            bid,
            name: fields.name,
            thumb: fields.thumb,
            process: fields.process,
            del: false,
            ctime: now,
            mtime: now,
            rolls: Vec::new(),
        }
    }

    pub fn apply(&mut self, fields: BookFields) {
        self.name = fields.name;
        self.thumb = fields.thumb;
        self.process = fields.process;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.mtime = now;
    }
}

/// A roll (volume) inside a book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Roll {
    pub rid: RollId,
    pub bid: BookId,
    pub name: String,
    #[serde(with = "ts_milliseconds")]
    pub ctime: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub mtime: DateTime<Utc>,
    /// Chapter ids in display order
    #[serde(default)]
    pub chapters: Vec<ChapterId>,
}

impl Roll {
    pub fn new(rid: RollId, bid: BookId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            rid,
            bid,
            name: name.into(),
            ctime: now,
            mtime: now,
            chapters: Vec::new(),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.mtime = now;
    }
}

/// A chapter, the leaf text unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    pub cid: ChapterId,
    pub rid: RollId,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(with = "ts_milliseconds")]
    pub ctime: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub mtime: DateTime<Utc>,
}

impl Chapter {
    pub fn new(
        cid: ChapterId,
        rid: RollId,
        name: impl Into<String>,
        value: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            cid,
            rid,
            name: name.into(),
            value: value.into(),
            ctime: now,
            mtime: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.mtime = now;
    }
}

/// A retained snapshot of a chapter's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct History {
    pub hid: HistoryId,
    pub cid: ChapterId,
    pub value: String,
    #[serde(with = "ts_milliseconds")]
    pub ctime: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub mtime: DateTime<Utc>,
}

impl History {
    pub fn new(hid: HistoryId, cid: ChapterId, value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            hid,
            cid,
            value: value.into(),
            ctime: now,
            mtime: now,
        }
    }
}

/// A free-form note attached to a book
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub nid: NoteId,
    pub bid: BookId,
    pub name: String,
    pub value: String,
    #[serde(with = "ts_milliseconds")]
    pub ctime: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub mtime: DateTime<Utc>,
}

impl Note {
    pub fn new(
        nid: NoteId,
        bid: BookId,
        name: impl Into<String>,
        value: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            nid,
            bid,
            name: name.into(),
            value: value.into(),
            ctime: now,
            mtime: now,
        }
    }
}

/// A roll together with its chapters, in display order
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RollDetail {
    pub roll: Roll,
    pub chapters: Vec<Chapter>,
}

/// A book fully hydrated with its rolls and their chapters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookDetail {
    pub book: Book,
    pub rolls: Vec<RollDetail>,
}

impl BookDetail {
    /// Total number of chapters across all rolls
    pub fn chapter_count(&self) -> usize {
        self.rolls.iter().map(|r| r.chapters.len()).sum()
    }
}

impl Record for Book {
    const COLLECTION: Collection = Collection::Books;

    fn key(&self) -> i64 {
        self.bid
    }
}

impl Record for Roll {
    const COLLECTION: Collection = Collection::Rolls;

    fn key(&self) -> i64 {
        self.rid
    }
}

impl Record for Chapter {
    const COLLECTION: Collection = Collection::Chapters;

    fn key(&self) -> i64 {
        self.cid
    }
}

impl Record for History {
    const COLLECTION: Collection = Collection::History;

    fn key(&self) -> i64 {
        self.hid
    }
}

impl Record for Note {
    const COLLECTION: Collection = Collection::Notes;

    fn key(&self) -> i64 {
        self.nid
    }
}

/// Stores the soft-delete flag as an integer so it can be looked up by index.
mod del_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(del: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*del))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}
