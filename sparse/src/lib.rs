//! Address a remote, paged collection as a lazily fetched, windowed array.
//!
//! A [Cache] presents every index of a collection whose total size is unknown (or expensive to
//! compute) as if it were materialized. Reading an index returns a [Slot] immediately, possibly
//! without content, and asks the host (through a [Source]) to fetch the fixed-size window that
//! contains it. The host answers later with [Cache::provide_range] and [Cache::provide_length].
//!
//! # Windows
//!
//! Index `i` belongs to the window starting at `(i / window_size) * window_size`. Windows never
//! overlap, and the final window is clipped to the length once the length is known. At most one
//! request per window is outstanding at any time, and no request is issued for a window whose
//! slots are all fresh.
//!
//! # Freshness
//!
//! A [Slot] is _stale_ when it has no content or its content is older than its own time-to-live.
//! Independently, [Cache::expire] advances a cache-wide marker: every slot delivered before the
//! marker moved is _expired_ and its window is fetched again on the next access, while the old
//! content stays readable until the new data lands. Slots whose window is being fetched are never
//! reported as expired.
//!
//! # Invalidation
//!
//! [Cache::unset] clears the content of any mixture of indices, ranges and nested groups of
//! either (see [Target]). [Cache::expire] invalidates everything at once without touching the
//! slots themselves.
//!
//! # Example
//!
//! ```rust
//! use ella_sparse::{driver::{Queue, Request}, Cache, Config, Window};
//! use ella_utils::SystemClock;
//!
//! let mut cache: Cache<u64, _, _> = Cache::new(Queue::default(), SystemClock, Config::default());
//!
//! // Touch a few indices in the same window (only one request is issued)
//! for index in [3, 5, 7] {
//!     assert!(cache.get(index).is_some());
//! }
//! let requests = cache.source_mut().drain();
//! assert_eq!(requests, vec![Request::Range(Window::new(0, 10))]);
//!
//! // Deliver the window
//! let records = (0..10).map(|i| i * 100).collect();
//! cache.provide_range(Window::new(0, 10), records).unwrap();
//! assert_eq!(cache.get(5).and_then(|slot| slot.content()), Some(&500));
//! ```

use std::{fmt, ops::Range};
use thiserror::Error;

mod config;
pub use config::{Config, DEFAULT_TTL, DEFAULT_WINDOW_SIZE};
mod slot;
pub use slot::Slot;
mod storage;
pub use storage::Cache;
mod target;
pub use target::Target;
pub mod driver;
pub mod metrics;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// Errors that can occur when interacting with the [Cache].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("delivered {records} records for {window}")]
    TooManyRecords { window: Window, records: usize },
    #[error("window overflows the index space: {0}")]
    WindowOverflow(Window),
    #[error("invalid range: {start}..={end}")]
    InvalidRange { start: u64, end: u64 },
    #[error("cannot resize windows while {0} are pending")]
    WindowsPending(usize),
    #[error("load failed: {0}")]
    Load(String),
}

/// A contiguous run of indices requested from, or delivered by, a [Source].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Window {
    /// First index of the window.
    pub start: u64,
    /// Number of indices in the window.
    pub length: u64,
}

impl Window {
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Returns one past the last index of the window, if representable.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.length)
    }

    /// Returns the indices covered by the window (empty if the window overflows).
    pub fn indices(&self) -> Range<u64> {
        match self.end() {
            Some(end) => self.start..end,
            None => self.start..self.start,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window(start={}, length={})", self.start, self.length)
    }
}

/// The host-side operations a [Cache] relies on to discover its length and fetch records.
///
/// Both operations are fire-and-forget: the implementation is expected to eventually call
/// [Cache::provide_length] or [Cache::provide_range] with the result. Failing to do so leaves the
/// request outstanding (and suppresses duplicate requests) indefinitely.
pub trait Source {
    /// Begin discovering the total number of records.
    fn request_length(&mut self);

    /// Begin fetching the records in `window`.
    fn request_range(&mut self, window: Window);
}

/// State transitions published to subscribers of a [Cache] (see [Cache::subscribe]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The total length was delivered.
    LengthResolved(u64),

    /// A window was requested from the [Source].
    RangeRequested(Window),

    /// Content was written to the slot at the given index.
    SlotUpdated(u64),

    /// Content was cleared from the slot at the given index.
    SlotInvalidated(u64),

    /// The expiry marker advanced to the given value.
    Expired(u64),
}
