//! Book notes
//!
//! Note writes are lenient: empty fields, a missing note or a missing book
//! turn the call into a no-op instead of an error.

use anyhow::{Context, Result};
use tracing::debug;

use super::Store;
use crate::models::{Book, BookId, Note, NoteId};

impl Store {
    // ==================== Note Operations ====================

    /// Notes attached to a book
    pub fn list_notes(&self, bid: BookId) -> Result<Vec<Note>> {
        self.records()
            .get_all_by_index("bid", bid)
            .context("Failed to get notes")
    }

    /// Attach a note to a book
    ///
    /// Returns `None` when `name` or `value` is empty or the book is missing.
    pub fn create_note(&mut self, bid: BookId, name: &str, value: &str) -> Result<Option<Note>> {
        if name.is_empty() || value.is_empty() {
            return Ok(None);
        }

        let (now, nid) = self.stamp();
        let note = Note::new(nid, bid, name, value, now);

        let created = self
            .gateway
            .transaction(|records| -> Result<bool> {
                let Some(mut book) = records.get::<Book>(bid)? else {
                    return Ok(false);
                };
                book.touch(now);
                records.insert(&note)?;
                records.upsert(&book)?;
                Ok(true)
            })
            .context("Failed to create note")?;

        if !created {
            return Ok(None);
        }
        debug!("Created note {} in book {}", nid, bid);
        Ok(Some(note))
    }

    /// Replace a note's name and value
    ///
    /// Returns `false` when a field is empty, the note or its book is
    /// missing, or nothing changed.
    pub fn update_note(&mut self, nid: NoteId, name: &str, value: &str) -> Result<bool> {
        if name.is_empty() || value.is_empty() {
            return Ok(false);
        }

        let now = self.now();
        let updated = self
            .gateway
            .transaction(|records| -> Result<bool> {
                let Some(mut note) = records.get::<Note>(nid)? else {
                    return Ok(false);
                };
                let Some(mut book) = records.get::<Book>(note.bid)? else {
                    return Ok(false);
                };
                if note.name == name && note.value == value {
                    return Ok(false);
                }

                note.name = name.to_string();
                note.value = value.to_string();
                note.mtime = now;
                book.touch(now);

                records.upsert(&note)?;
                records.upsert(&book)?;
                Ok(true)
            })
            .context("Failed to update note")?;

        if updated {
            debug!("Updated note {}", nid);
        }
        Ok(updated)
    }

    /// Remove a note
    ///
    /// Returns `false` when the note or its book is missing.
    pub fn delete_note(&mut self, nid: NoteId) -> Result<bool> {
        let now = self.now();
        let deleted = self
            .gateway
            .transaction(|records| -> Result<bool> {
                let Some(note) = records.get::<Note>(nid)? else {
                    return Ok(false);
                };
                let Some(mut book) = records.get::<Book>(note.bid)? else {
                    return Ok(false);
                };
                book.touch(now);
                records.upsert(&book)?;
                records.delete::<Note>(nid)?;
                Ok(true)
            })
            .context("Failed to delete note")?;

        if deleted {
            debug!("Deleted note {}", nid);
        }
        Ok(deleted)
    }
}
