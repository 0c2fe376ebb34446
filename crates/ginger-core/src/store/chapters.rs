//! Chapter operations and chapter history
//!
//! Editing a chapter's text goes through [`Store::set_chapter_value`], which
//! records a snapshot under the store's [`HistoryPolicy`](crate::history::HistoryPolicy).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{touch_roll_and_book, Store};
use crate::models::{Chapter, ChapterId, History, HistoryId, Roll, RollId};
use crate::storage::{Records, StorageResult};

impl Store {
    // ==================== Chapter Operations ====================

    /// Get a chapter by ID
    pub fn get_chapter(&self, cid: ChapterId) -> Result<Option<Chapter>> {
        self.records().get(cid).context("Failed to get chapter")
    }

    /// Append a chapter to a roll
    pub fn create_chapter(&mut self, rid: RollId, name: &str, value: &str) -> Result<Chapter> {
        let (now, cid) = self.stamp();
        let chapter = Chapter::new(cid, rid, name, value, now);

        self.gateway
            .transaction(|records| -> Result<()> {
                let mut roll: Roll = records.get_existing(rid)?;
                roll.chapters.push(cid);
                touch_roll_and_book(records, &mut roll, now)?;
                records.insert(&chapter)?;
                Ok(())
            })
            .context("Failed to create chapter")?;

        debug!("Created chapter {} in roll {}", cid, rid);
        Ok(chapter)
    }

    /// Delete a chapter and its history
    pub fn delete_chapter(&mut self, cid: ChapterId) -> Result<()> {
        let now = self.now();
        self.gateway
            .transaction(|records| -> Result<()> {
                let chapter: Chapter = records.get_existing(cid)?;
                let mut roll: Roll = records.get_existing(chapter.rid)?;
                roll.chapters.retain(|id| *id != cid);
                touch_roll_and_book(records, &mut roll, now)?;

                records.delete_all_by_index::<History>("cid", cid)?;
                records.delete::<Chapter>(cid)?;
                Ok(())
            })
            .context("Failed to delete chapter")?;

        info!("Deleted chapter {}", cid);
        Ok(())
    }

    /// Rename a chapter
    ///
    /// Returns `false` without touching anything when the name is unchanged.
    pub fn rename_chapter(&mut self, cid: ChapterId, name: &str) -> Result<bool> {
        let now = self.now();
        self.gateway
            .transaction(|records| update_chapter(records, cid, Some(name), None, now))
            .context("Failed to rename chapter")
    }

    /// Replace a chapter's text and record a history snapshot
    ///
    /// A snapshot is recorded even when the text is unchanged.
    pub fn set_chapter_value(&mut self, cid: ChapterId, value: &str) -> Result<History> {
        let (now, hid) = self.stamp();
        let policy = self.policy;
        let snapshot = History::new(hid, cid, value, now);

        let retention = self
            .gateway
            .transaction(|records| -> Result<_> {
                update_chapter(records, cid, None, Some(value), now)?;

                let existing: Vec<History> = records.get_all_by_index("cid", cid)?;
                let retention = policy.plan(&existing, &snapshot);
                for doomed in retention.deletions() {
                    records.delete::<History>(doomed)?;
                }
                records.insert(&snapshot)?;
                Ok(retention)
            })
            .context("Failed to set chapter value")?;

        debug!(
            "Recorded history {} for chapter {} (evicted {:?}, merged {:?})",
            hid, cid, retention.evict, retention.merge_away
        );
        Ok(snapshot)
    }

    /// History snapshots of a chapter, oldest first
    pub fn list_history(&self, cid: ChapterId) -> Result<Vec<History>> {
        self.records()
            .get_all_by_index("cid", cid)
            .context("Failed to get history")
    }

    /// Restore a chapter's text from a history snapshot
    ///
    /// Returns `false` when the snapshot matches the current text. Reverting
    /// does not record a snapshot of its own.
    pub fn revert_chapter(&mut self, cid: ChapterId, hid: HistoryId) -> Result<bool> {
        let now = self.now();
        let reverted = self
            .gateway
            .transaction(|records| -> Result<bool> {
                let history: History = records.get_existing(hid)?;
                Ok(update_chapter(records, cid, None, Some(history.value.as_str()), now)?)
            })
            .context("Failed to revert chapter")?;

        if reverted {
            debug!("Reverted chapter {} to history {}", cid, hid);
        }
        Ok(reverted)
    }
}

/// Apply a name and/or value change, stamping chapter, roll and book
///
/// Returns `false` when neither field differs from what is stored.
fn update_chapter(
    records: &Records<'_>,
    cid: ChapterId,
    name: Option<&str>,
    value: Option<&str>,
    now: DateTime<Utc>,
) -> StorageResult<bool> {
    let mut chapter: Chapter = records.get_existing(cid)?;

    let name_changed = name.is_some_and(|n| n != chapter.name);
    let value_changed = value.is_some_and(|v| v != chapter.value);
    if !name_changed && !value_changed {
        return Ok(false);
    }

    if let Some(name) = name {
        chapter.name = name.to_string();
    }
    if let Some(value) = value {
        chapter.value = value.to_string();
    }
    chapter.touch(now);
    records.upsert(&chapter)?;

    let mut roll: Roll = records.get_existing(chapter.rid)?;
    touch_roll_and_book(records, &mut roll, now)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_store;
    use super::*;
    use crate::clock::Clock;
    use crate::models::{BookFields, DEFAULT_CHAPTER_NAME};
    use crate::storage::StorageError;

    /// A fresh book's first roll and chapter ids
    fn first_chapter(store: &mut Store) -> (RollId, ChapterId) {
        let book = store.create_book(BookFields::named("B")).unwrap();
        let detail = store.get_book_detail(book.bid).unwrap().unwrap();
        (book.rolls[0], detail.rolls[0].chapters[0].cid)
    }

    #[test]
    fn test_create_chapter() {
        let (_temp_dir, clock, mut store) = test_store();
        let (rid, first) = first_chapter(&mut store);

        clock.advance_minutes(1);
        let chapter = store.create_chapter(rid, "C2", "x").unwrap();
        assert_eq!(chapter.rid, rid);
        assert_eq!(chapter.value, "x");

        let roll = store.get_roll(rid).unwrap().unwrap();
        assert_eq!(roll.chapters, vec![first, chapter.cid]);
        assert_eq!(roll.mtime, chapter.ctime);
        let book = store.get_book(roll.bid).unwrap().unwrap();
        assert_eq!(book.mtime, chapter.ctime);
    }

    #[test]
    fn test_create_chapter_missing_roll() {
        let (_temp_dir, _clock, mut store) = test_store();
        let err = store.create_chapter(31, "C", "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound { key: 31, .. })
        ));
        assert_eq!(store.records().count::<Chapter>().unwrap(), 0);
    }

    #[test]
    fn test_delete_chapter_removes_history() {
        let (_temp_dir, clock, mut store) = test_store();
        let (rid, first) = first_chapter(&mut store);
        let chapter = store.create_chapter(rid, "C2", "x").unwrap();
        store.set_chapter_value(chapter.cid, "y").unwrap();

        clock.advance_minutes(1);
        store.delete_chapter(chapter.cid).unwrap();

        assert!(store.get_chapter(chapter.cid).unwrap().is_none());
        assert!(store.list_history(chapter.cid).unwrap().is_empty());
        let roll = store.get_roll(rid).unwrap().unwrap();
        assert_eq!(roll.chapters, vec![first]);
        assert_eq!(roll.mtime, clock.now());
    }

    #[test]
    fn test_rename_chapter() {
        let (_temp_dir, clock, mut store) = test_store();
        let (rid, cid) = first_chapter(&mut store);

        clock.advance_minutes(1);
        assert!(!store.rename_chapter(cid, DEFAULT_CHAPTER_NAME).unwrap());
        let roll = store.get_roll(rid).unwrap().unwrap();
        assert!(roll.mtime < clock.now());

        assert!(store.rename_chapter(cid, "Prologue").unwrap());
        let chapter = store.get_chapter(cid).unwrap().unwrap();
        assert_eq!(chapter.name, "Prologue");
        assert_eq!(chapter.mtime, clock.now());
        assert_eq!(store.get_roll(rid).unwrap().unwrap().mtime, clock.now());

        // Renaming never records history
        assert!(store.list_history(cid).unwrap().is_empty());
    }

    #[test]
    fn test_set_value_records_history() {
        let (_temp_dir, clock, mut store) = test_store();
        let (_rid, cid) = first_chapter(&mut store);

        clock.advance_minutes(1);
        let snapshot = store.set_chapter_value(cid, "hello").unwrap();
        assert_eq!(snapshot.cid, cid);
        assert_eq!(snapshot.value, "hello");

        let chapter = store.get_chapter(cid).unwrap().unwrap();
        assert_eq!(chapter.value, "hello");
        assert_eq!(chapter.mtime, snapshot.ctime);
        assert_eq!(store.list_history(cid).unwrap(), vec![snapshot]);
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let (_temp_dir, clock, mut store) = test_store();
        let (_rid, cid) = first_chapter(&mut store);

        let mut written = Vec::new();
        for i in 0..12 {
            written.push(store.set_chapter_value(cid, &format!("v{i}")).unwrap().hid);
            clock.advance_minutes(5);
        }

        let history = store.list_history(cid).unwrap();
        assert_eq!(history.len(), 10);
        let kept: Vec<HistoryId> = history.iter().map(|h| h.hid).collect();
        assert_eq!(kept, written[2..].to_vec());
        assert_eq!(history[0].value, "v2");
    }

    #[test]
    fn test_same_bucket_edits_merge() {
        let (_temp_dir, clock, mut store) = test_store();
        let (_rid, cid) = first_chapter(&mut store);

        store.set_chapter_value(cid, "a").unwrap();
        clock.advance_minutes(5);
        store.set_chapter_value(cid, "b").unwrap();
        clock.advance_minutes(2);
        let latest = store.set_chapter_value(cid, "c").unwrap();

        let history = store.list_history(cid).unwrap();
        let values: Vec<&str> = history.iter().map(|h| h.value.as_str()).collect();
        assert_eq!(values, vec!["a", "c"]);
        assert_eq!(history[1].hid, latest.hid);
    }

    #[test]
    fn test_unchanged_value_still_records_history() {
        let (_temp_dir, clock, mut store) = test_store();
        let (_rid, cid) = first_chapter(&mut store);

        store.set_chapter_value(cid, "same").unwrap();
        let edited = store.get_chapter(cid).unwrap().unwrap();

        clock.advance_minutes(5);
        store.set_chapter_value(cid, "same").unwrap();

        assert_eq!(store.list_history(cid).unwrap().len(), 2);
        // The chapter itself was not touched
        assert_eq!(store.get_chapter(cid).unwrap().unwrap().mtime, edited.mtime);
    }

    #[test]
    fn test_revert_chapter() {
        let (_temp_dir, clock, mut store) = test_store();
        let (rid, cid) = first_chapter(&mut store);

        let first = store.set_chapter_value(cid, "first").unwrap();
        clock.advance_minutes(5);
        let second = store.set_chapter_value(cid, "second").unwrap();

        clock.advance_minutes(1);
        assert!(!store.revert_chapter(cid, second.hid).unwrap());
        assert_eq!(store.get_chapter(cid).unwrap().unwrap().mtime, second.ctime);

        assert!(store.revert_chapter(cid, first.hid).unwrap());
        let chapter = store.get_chapter(cid).unwrap().unwrap();
        assert_eq!(chapter.value, "first");
        assert_eq!(chapter.mtime, clock.now());
        assert_eq!(store.get_roll(rid).unwrap().unwrap().mtime, clock.now());

        // No snapshot for the revert itself
        assert_eq!(store.list_history(cid).unwrap().len(), 2);
    }

    #[test]
    fn test_failed_edit_rolls_back() {
        let (_temp_dir, _clock, mut store) = test_store();
        let (rid, cid) = first_chapter(&mut store);

        // Point the roll at a book that does not exist
        let mut roll = store.get_roll(rid).unwrap().unwrap();
        roll.bid = 1;
        store.records().upsert(&roll).unwrap();

        let err = store.set_chapter_value(cid, "lost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound { key: 1, .. })
        ));
        assert_eq!(store.get_chapter(cid).unwrap().unwrap().value, "");
        assert!(store.list_history(cid).unwrap().is_empty());
    }

    #[test]
    fn test_revert_to_missing_history_faults() {
        let (_temp_dir, _clock, mut store) = test_store();
        let (_rid, cid) = first_chapter(&mut store);

        let err = store.revert_chapter(cid, 8).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound { key: 8, .. })
        ));
    }
}
