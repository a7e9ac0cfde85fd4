//! Mock implementations for testing.

use crate::{
    driver::{Loader, Page},
    Window,
};
use futures::future;
use std::{
    collections::BTreeSet,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};
use thiserror::Error;

/// A record served by the [Catalog].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    /// One-based identifier (the record at index `i` has id `i + 1`).
    pub id: u64,
    pub note: String,
}

impl Record {
    /// Returns the record stored at `index`.
    pub fn new(index: u64) -> Self {
        let id = index + 1;
        Self {
            id,
            note: format!("This is item {id}"),
        }
    }
}

/// Failures injected into the [Catalog].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("length unavailable")]
    LengthUnavailable,
    #[error("{0} unavailable")]
    WindowUnavailable(Window),
}

/// A [Loader] serving a fixed number of generated [Record]s.
///
/// Every page also reports the total. Loads resolve immediately. Clones share request counts and
/// injected failures.
#[derive(Clone)]
pub struct Catalog {
    total: u64,
    requests: Arc<AtomicUsize>,
    failing: Arc<Mutex<BTreeSet<Window>>>,
    length_fails: Arc<AtomicBool>,
}

impl Catalog {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            requests: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(Mutex::new(BTreeSet::new())),
            length_fails: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the number of range loads started (including failed ones).
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    /// Make loads of `window` fail until [Self::recover] is called.
    pub fn fail(&self, window: Window) {
        self.failing.lock().unwrap().insert(window);
    }

    pub fn recover(&self, window: Window) {
        self.failing.lock().unwrap().remove(&window);
    }

    /// Make length loads fail (or succeed again).
    pub fn fail_length(&self, fail: bool) {
        self.length_fails.store(fail, Ordering::Relaxed);
    }
}

impl Loader for Catalog {
    type Value = Record;
    type Error = CatalogError;

    fn length(&mut self) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'static {
        let result = match self.length_fails.load(Ordering::Relaxed) {
            true => Err(CatalogError::LengthUnavailable),
            false => Ok(self.total),
        };
        future::ready(result)
    }

    fn range(
        &mut self,
        window: Window,
    ) -> impl Future<Output = Result<Page<Self::Value>, Self::Error>> + Send + 'static {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = match self.failing.lock().unwrap().contains(&window) {
            true => Err(CatalogError::WindowUnavailable(window)),
            false => {
                let total = self.total;
                let records = window
                    .indices()
                    .take_while(|index| *index < total)
                    .map(Record::new)
                    .collect();
                Ok(Page {
                    records,
                    total: Some(total),
                })
            }
        };
        future::ready(result)
    }
}

/// Install a test subscriber for `tracing` output (idempotent).
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
