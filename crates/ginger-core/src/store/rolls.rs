//! Roll (volume) operations

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{touch_roll_and_book, Store};
use crate::models::{Book, BookId, Chapter, History, Roll, RollDetail, RollId, DEFAULT_CHAPTER_NAME};

impl Store {
    // ==================== Roll Operations ====================

    /// Get a roll by ID
    pub fn get_roll(&self, rid: RollId) -> Result<Option<Roll>> {
        self.records().get(rid).context("Failed to get roll")
    }

    /// Append a roll, with one empty chapter, to a book
    pub fn create_roll(&mut self, bid: BookId, name: &str) -> Result<RollDetail> {
        let (now, rid) = self.stamp();
        let cid = self.ids.next(now);

        let chapter = Chapter::new(cid, rid, DEFAULT_CHAPTER_NAME, "", now);
        let mut roll = Roll::new(rid, bid, name, now);
        roll.chapters.push(cid);

        self.gateway
            .transaction(|records| -> Result<()> {
                let mut book: Book = records.get_existing(bid)?;
                records.insert(&chapter)?;
                book.rolls.push(rid);
                book.touch(now);
                records.insert(&roll)?;
                records.upsert(&book)?;
                Ok(())
            })
            .context("Failed to create roll")?;

        debug!("Created roll {} in book {}", rid, bid);
        Ok(RollDetail {
            roll,
            chapters: vec![chapter],
        })
    }

    /// Rename a roll
    ///
    /// Returns `false` without touching anything when the name is unchanged.
    pub fn update_roll(&mut self, rid: RollId, name: &str) -> Result<bool> {
        let now = self.now();
        let changed = self
            .gateway
            .transaction(|records| -> Result<bool> {
                let mut roll: Roll = records.get_existing(rid)?;
                if roll.name == name {
                    return Ok(false);
                }
                roll.name = name.to_string();
                touch_roll_and_book(records, &mut roll, now)?;
                Ok(true)
            })
            .context("Failed to update roll")?;

        if changed {
            debug!("Renamed roll {}", rid);
        }
        Ok(changed)
    }

    /// Delete a roll with its chapters and their history
    pub fn delete_roll(&mut self, rid: RollId) -> Result<()> {
        let now = self.now();
        self.gateway
            .transaction(|records| -> Result<()> {
                let roll: Roll = records.get_existing(rid)?;
                let mut book: Book = records.get_existing(roll.bid)?;

                // Listed chapters plus any stray rows still pointing at the roll
                let mut cids = roll.chapters.clone();
                for chapter in records.get_all_by_index::<Chapter>("rid", rid)? {
                    if !cids.contains(&chapter.cid) {
                        cids.push(chapter.cid);
                    }
                }

                records.delete_all_by_key_set::<History>("cid", &cids)?;
                records.delete_all_by_index::<Chapter>("rid", rid)?;
                records.delete::<Roll>(rid)?;

                book.rolls.retain(|id| *id != rid);
                book.touch(now);
                records.upsert(&book)?;
                Ok(())
            })
            .context("Failed to delete roll")?;

        info!("Deleted roll {}", rid);
        Ok(())
    }
}
