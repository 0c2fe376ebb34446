//! Book lifecycle: create, edit, soft delete, listing and full hydration

use std::cmp::Ordering;

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{order_by_list, Store};
use crate::models::{
    Book, BookDetail, BookFields, BookId, Chapter, Roll, RollDetail, DEFAULT_CHAPTER_NAME,
    DEFAULT_ROLL_NAME,
};
use crate::storage::Records;

/// Field used to order the book list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookSort {
    #[default]
    Mtime,
    Ctime,
    Name,
    Process,
    Bid,
}

impl BookSort {
    fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            BookSort::Mtime => a.mtime.cmp(&b.mtime),
            BookSort::Ctime => a.ctime.cmp(&b.ctime),
            BookSort::Name => a.name.cmp(&b.name),
            BookSort::Process => a.process.cmp(&b.process),
            BookSort::Bid => a.bid.cmp(&b.bid),
        }
    }
}

impl Store {
    // ==================== Book Operations ====================

    /// Books that are not soft-deleted, sorted by `sort`
    ///
    /// The sort is stable: books comparing equal keep their fetch order.
    pub fn list_books(&self, sort: BookSort, descending: bool) -> Result<Vec<Book>> {
        let mut books: Vec<Book> = self
            .records()
            .get_all_by_index("del", 0)
            .context("Failed to get books")?;

        books.sort_by(|a, b| {
            let ordering = sort.compare(a, b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        Ok(books)
    }

    /// Books that are not soft-deleted, most recently modified first
    pub fn list_active_books(&self) -> Result<Vec<Book>> {
        self.list_books(BookSort::Mtime, true)
    }

    /// Soft-deleted books
    pub fn list_deleted_books(&self) -> Result<Vec<Book>> {
        self.records()
            .get_all_by_index("del", 1)
            .context("Failed to get deleted books")
    }

    /// Get a book by ID
    pub fn get_book(&self, bid: BookId) -> Result<Option<Book>> {
        self.records().get(bid).context("Failed to get book")
    }

    /// Get a book with its rolls and their chapters
    ///
    /// Rolls and chapters follow the order of the book's and roll's id lists.
    pub fn get_book_detail(&self, bid: BookId) -> Result<Option<BookDetail>> {
        let records = self.records();
        let Some(book) = records.get::<Book>(bid).context("Failed to get book")? else {
            return Ok(None);
        };

        let detail = hydrate(&records, book).context("Failed to load book contents")?;
        Ok(Some(detail))
    }

    /// Create a book with one roll holding one empty chapter
    pub fn create_book(&mut self, fields: BookFields) -> Result<Book> {
        let (now, bid) = self.stamp();
        let rid = self.ids.next(now);
        let cid = self.ids.next(now);

        let chapter = Chapter::new(cid, rid, DEFAULT_CHAPTER_NAME, "", now);
        let mut roll = Roll::new(rid, bid, DEFAULT_ROLL_NAME, now);
        roll.chapters.push(cid);
        let mut book = Book::new(bid, fields, now);
        book.rolls.push(rid);

        self.gateway
            .transaction(|records| -> Result<()> {
                records.insert(&chapter)?;
                records.insert(&roll)?;
                records.insert(&book)?;
                Ok(())
            })
            .context("Failed to create book")?;

        info!("Created book {} ({:?})", bid, book.name);
        Ok(book)
    }

    /// Replace a book's editable fields
    pub fn update_book(&mut self, bid: BookId, fields: BookFields) -> Result<()> {
        let now = self.now();
        self.gateway
            .transaction(|records| -> Result<()> {
                let mut book: Book = records.get_existing(bid)?;
                book.apply(fields);
                book.touch(now);
                records.upsert(&book)?;
                Ok(())
            })
            .context("Failed to update book")?;

        debug!("Updated book {}", bid);
        Ok(())
    }

    /// Move a book to the trash
    pub fn soft_delete_book(&mut self, bid: BookId) -> Result<()> {
        self.set_deleted(bid, true)
            .context("Failed to delete book")?;
        info!("Soft-deleted book {}", bid);
        Ok(())
    }

    /// Restore a book from the trash
    pub fn undo_soft_delete_book(&mut self, bid: BookId) -> Result<()> {
        self.set_deleted(bid, false)
            .context("Failed to restore book")?;
        info!("Restored book {}", bid);
        Ok(())
    }

    fn set_deleted(&mut self, bid: BookId, del: bool) -> Result<()> {
        let now = self.now();
        self.gateway.transaction(|records| -> Result<()> {
            let mut book: Book = records.get_existing(bid)?;
            book.del = del;
            book.touch(now);
            records.upsert(&book)?;
            Ok(())
        })
    }
}

fn hydrate(records: &Records<'_>, book: Book) -> Result<BookDetail> {
    let rolls: Vec<Roll> = records.get_all_by_index("bid", book.bid)?;
    let rolls = order_by_list(rolls, &book.rolls, |r| r.rid);

    let mut details = Vec::with_capacity(rolls.len());
    for roll in rolls {
        let chapters: Vec<Chapter> = records.get_all_by_index("rid", roll.rid)?;
        let chapters = order_by_list(chapters, &roll.chapters, |c| c.cid);
        details.push(RollDetail { roll, chapters });
    }

    Ok(BookDetail {
        book,
        rolls: details,
    })
}
