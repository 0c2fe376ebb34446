//! Agreement between the ordered child-id lists and the indexed child rows

use std::fmt;

use anyhow::{Context, Result};
use tracing::warn;

use super::Store;
use crate::models::{Book, BookId, Chapter, ChapterId, Roll, RollId};
use crate::storage::{Records, StorageResult};

/// A disagreement between a parent's child list and the child rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inconsistency {
    /// The book lists a roll that has no row
    MissingRoll { bid: BookId, rid: RollId },
    /// A roll row points at the book but is not in its list
    UnlistedRoll { bid: BookId, rid: RollId },
    /// The roll lists a chapter that has no row
    MissingChapter { rid: RollId, cid: ChapterId },
    /// A chapter row points at the roll but is not in its list
    UnlistedChapter { rid: RollId, cid: ChapterId },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::MissingRoll { bid, rid } => {
                write!(f, "book {} lists missing roll {}", bid, rid)
            }
            Inconsistency::UnlistedRoll { bid, rid } => {
                write!(f, "roll {} belongs to book {} but is not listed", rid, bid)
            }
            Inconsistency::MissingChapter { rid, cid } => {
                write!(f, "roll {} lists missing chapter {}", rid, cid)
            }
            Inconsistency::UnlistedChapter { rid, cid } => {
                write!(f, "chapter {} belongs to roll {} but is not listed", cid, rid)
            }
        }
    }
}

impl Store {
    /// Compare a book's roll list and its rolls' chapter lists with the rows
    ///
    /// An empty result means the lists and the indexes agree. A missing book
    /// has nothing to compare and also yields an empty result.
    pub fn check_consistency(&self, bid: BookId) -> Result<Vec<Inconsistency>> {
        let records = self.records();
        let Some(book) = records.get::<Book>(bid).context("Failed to get book")? else {
            return Ok(Vec::new());
        };

        let problems = check_book(&records, &book).context("Failed to check book contents")?;
        for problem in &problems {
            warn!("Inconsistent book {}: {}", bid, problem);
        }
        Ok(problems)
    }
}

fn check_book(records: &Records<'_>, book: &Book) -> StorageResult<Vec<Inconsistency>> {
    let mut problems = Vec::new();
    let rows: Vec<Roll> = records.get_all_by_index("bid", book.bid)?;

    for rid in &book.rolls {
        if !rows.iter().any(|r| r.rid == *rid) {
            problems.push(Inconsistency::MissingRoll { bid: book.bid, rid: *rid });
        }
    }

    for roll in &rows {
        if !book.rolls.contains(&roll.rid) {
            problems.push(Inconsistency::UnlistedRoll {
                bid: book.bid,
                rid: roll.rid,
            });
        }

        let chapters: Vec<Chapter> = records.get_all_by_index("rid", roll.rid)?;
        for cid in &roll.chapters {
            if !chapters.iter().any(|c| c.cid == *cid) {
                problems.push(Inconsistency::MissingChapter { rid: roll.rid, cid: *cid });
            }
        }
        for chapter in &chapters {
            if !roll.chapters.contains(&chapter.cid) {
                problems.push(Inconsistency::UnlistedChapter {
                    rid: roll.rid,
                    cid: chapter.cid,
                });
            }
        }
    }

    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_store;
    use super::*;
    use crate::models::BookFields;
    use chrono::Utc;

    #[test]
    fn test_fresh_book_is_consistent() {
        let (_temp_dir, _clock, mut store) = test_store();
        let book = store.create_book(BookFields::named("A")).unwrap();
        let roll = store.create_roll(book.bid, "Volume 2").unwrap();
        store.create_chapter(roll.roll.rid, "C2", "x").unwrap();

        assert!(store.check_consistency(book.bid).unwrap().is_empty());
        assert!(store.check_consistency(777).unwrap().is_empty());
    }

    #[test]
    fn test_detects_drift() {
        let (_temp_dir, _clock, mut store) = test_store();
        let book = store.create_book(BookFields::named("A")).unwrap();
        let rid = book.rolls[0];
        let listed = store.get_roll(rid).unwrap().unwrap().chapters[0];

        // Write rows behind the store's back
        let records = store.records();
        records.delete::<Chapter>(listed).unwrap();
        records
            .insert(&Chapter::new(9_000_001, rid, "stray", "", Utc::now()))
            .unwrap();
        records
            .insert(&Roll::new(9_000_002, book.bid, "stray", Utc::now()))
            .unwrap();
        let mut edited = store.get_book(book.bid).unwrap().unwrap();
        edited.rolls.push(9_000_003);
        records.upsert(&edited).unwrap();

        let problems = store.check_consistency(book.bid).unwrap();
        assert_eq!(problems.len(), 4);
        assert!(problems.contains(&Inconsistency::MissingRoll { bid: book.bid, rid: 9_000_003 }));
        assert!(problems.contains(&Inconsistency::UnlistedRoll { bid: book.bid, rid: 9_000_002 }));
        assert!(problems.contains(&Inconsistency::MissingChapter { rid, cid: listed }));
        assert!(problems.contains(&Inconsistency::UnlistedChapter { rid, cid: 9_000_001 }));
    }

    #[test]
    fn test_display() {
        let problem = Inconsistency::MissingChapter { rid: 1, cid: 2 };
        assert_eq!(problem.to_string(), "roll 1 lists missing chapter 2");
    }
}
