//! Chapter history retention
//!
//! Every chapter value edit records a snapshot. Two rules keep the list
//! short:
//!
//! - **Merge**: a snapshot taken in the same wall-clock minute bucket as the
//!   previous one replaces it. Only the minute-of-hour is compared, so
//!   10:02 and 11:03 share a bucket while 10:59 and 11:00 do not.
//! - **Evict**: once the count would exceed the limit, the oldest snapshots
//!   are dropped. Under a steady limit that is one per edit; after the limit
//!   is lowered, one edit drops as many as it takes to get back under it.

use chrono::{DateTime, Local, Timelike, Utc};

use crate::models::{History, HistoryId};

/// Retention limits for chapter history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    max_entries: usize,
    bucket_minutes: u32,
}

/// Deletions required before a new snapshot is inserted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Retention {
    /// Oldest snapshots, dropped to stay under the limit
    pub evict: Vec<HistoryId>,
    /// Previous snapshot, replaced by the incoming one
    pub merge_away: Option<HistoryId>,
}

impl Retention {
    /// Ids to delete, eviction first
    pub fn deletions(&self) -> impl Iterator<Item = HistoryId> + '_ {
        self.evict.iter().copied().chain(self.merge_away)
    }
}

impl HistoryPolicy {
    pub const DEFAULT_MAX_ENTRIES: usize = 10;
    pub const DEFAULT_BUCKET_MINUTES: u32 = 5;

    /// Zero values are clamped to 1
    pub fn new(max_entries: usize, bucket_minutes: u32) -> Self {
        Self {
            max_entries: max_entries.max(1),
            bucket_minutes: bucket_minutes.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn bucket_minutes(&self) -> u32 {
        self.bucket_minutes
    }

    /// Minute bucket of a timestamp in local wall-clock time
    fn bucket(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&Local).minute() / self.bucket_minutes
    }

    /// Whether two snapshots fall into the same minute bucket
    pub fn should_merge(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> bool {
        self.bucket(earlier) == self.bucket(later)
    }

    /// Decide what to delete before inserting `incoming`
    ///
    /// `existing` is the chapter's history in fetch (chronological) order.
    pub fn plan(&self, existing: &[History], incoming: &History) -> Retention {
        let excess = (existing.len() + 1).saturating_sub(self.max_entries);
        let evict: Vec<HistoryId> = existing[..excess].iter().map(|h| h.hid).collect();

        let merge_away = existing
            .last()
            .filter(|prev| self.should_merge(prev.ctime, incoming.ctime))
            .map(|h| h.hid)
            .filter(|hid| !evict.contains(hid));

        Retention { evict, merge_away }
    }
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES, Self::DEFAULT_BUCKET_MINUTES)
    }
}
