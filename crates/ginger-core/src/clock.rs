//! Time sources and record identifiers
//!
//! Every record is keyed by an integer derived from the wall clock. Two
//! records created in the same millisecond would collide, so ids come from
//! an [`IdAllocator`] that never hands out the same value twice, while the
//! creation and modification times are kept in separate fields.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle
/// and give another to the store.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance_ms(minutes * 60_000);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.now_ms.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }
}

/// Monotonic id generator.
///
/// Ids track the wall clock in milliseconds but are always strictly greater
/// than the previous one, even when several are allocated in the same
/// millisecond or the clock steps backwards.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    /// Create an allocator whose next id is greater than `floor`.
    ///
    /// Seed with the largest key already persisted so reopened stores never
    /// reuse an id.
    pub fn seeded(floor: i64) -> Self {
        Self { last: floor }
    }

    /// Allocate the next id for an event happening at `now`.
    pub fn next(&mut self, now: DateTime<Utc>) -> i64 {
        let id = now.timestamp_millis().max(self.last + 1);
        self.last = id;
        id
    }

    pub fn last(&self) -> i64 {
        self.last
    }
}
