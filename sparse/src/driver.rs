//! Connect a [Cache] to an asynchronous [Loader].
//!
//! The [Cache] only _announces_ requests (through its [Source]) and expects the host to answer
//! them later. The [Driver] packages the usual host: requests are queued by a [Queue], turned into
//! loader futures by [Driver::flush], and applied to the cache as they complete (in whatever
//! order the loader resolves them).
//!
//! The driver is single-threaded: it is polled by whoever owns it, and all cache mutations
//! happen inside [Driver::next].

use crate::{Cache, Config, Error, Source, Window};
use ella_utils::Clock;
use futures::{
    future::BoxFuture,
    stream::{FuturesUnordered, StreamExt},
    FutureExt,
};
use std::{collections::VecDeque, fmt::Display, future::Future};
use tracing::{debug, warn};

/// A request announced by a [Cache].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    /// Discover the total number of records.
    Length,

    /// Fetch the records in a window.
    Range(Window),
}

/// A [Source] that queues requests until they are drained.
#[derive(Clone, Debug, Default)]
pub struct Queue {
    requests: VecDeque<Request>,
}

impl Queue {
    /// Removes and returns all queued requests, oldest first.
    pub fn drain(&mut self) -> Vec<Request> {
        self.requests.drain(..).collect()
    }

    /// Returns the queued requests without removing them.
    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Source for Queue {
    fn request_length(&mut self) {
        self.requests.push_back(Request::Length);
    }

    fn request_range(&mut self, window: Window) {
        self.requests.push_back(Request::Range(window));
    }
}

/// Records returned for a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<V> {
    /// Records in index order, starting at the window's first index.
    pub records: Vec<V>,

    /// The total number of records, if the data source reports it alongside a page.
    pub total: Option<u64>,
}

/// Fetches data on behalf of a [Driver].
pub trait Loader: Clone + Send + 'static {
    /// The record type stored in each slot.
    type Value: Send + 'static;

    /// The failure type of a load.
    type Error: Display + Send + 'static;

    /// Load the total number of records.
    fn length(&mut self) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'static;

    /// Load the records in `window`.
    fn range(
        &mut self,
        window: Window,
    ) -> impl Future<Output = Result<Page<Self::Value>, Self::Error>> + Send + 'static;
}

/// A completed load.
enum Completion<V, E> {
    Length(Result<u64, E>),
    Range(Window, Result<Page<V>, E>),
}

/// The effect of a completed load on the [Cache].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The length was delivered.
    Length(u64),

    /// Records were delivered for a window.
    Range { window: Window, records: usize },
}

/// Drives a [Cache] with a [Loader].
pub struct Driver<L: Loader, C: Clock> {
    cache: Cache<L::Value, Queue, C>,
    loader: L,
    loads: FuturesUnordered<BoxFuture<'static, Completion<L::Value, L::Error>>>,
}

impl<L: Loader, C: Clock> Driver<L, C> {
    /// Create a new driver around an empty cache.
    pub fn new(loader: L, clock: C, cfg: Config) -> Self {
        Self {
            cache: Cache::new(Queue::default(), clock, cfg),
            loader,
            loads: FuturesUnordered::new(),
        }
    }

    pub fn cache(&self) -> &Cache<L::Value, Queue, C> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache<L::Value, Queue, C> {
        &mut self.cache
    }

    /// Returns the number of loads started but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.loads.len()
    }

    /// Start a load for every queued request. Returns the number started.
    pub fn flush(&mut self) -> usize {
        let requests = self.cache.source_mut().drain();
        let started = requests.len();
        for request in requests {
            let load = match request {
                Request::Length => self.loader.length().map(Completion::Length).boxed(),
                Request::Range(window) => self
                    .loader
                    .range(window)
                    .map(move |result| Completion::Range(window, result))
                    .boxed(),
            };
            self.loads.push(load);
        }
        if started > 0 {
            debug!(started, in_flight = self.loads.len(), "started loads");
        }
        started
    }

    /// Start any queued loads, then wait for one load to complete and apply it to the cache.
    ///
    /// Returns `None` when nothing is queued or in flight. A failed load releases its request
    /// (so a later access can issue it again) and is returned as [Error::Load]. A page the cache
    /// rejects also releases its window and returns the rejection.
    pub async fn next(&mut self) -> Option<Result<Applied, Error>> {
        self.flush();
        let completion = self.loads.next().await?;
        Some(self.apply(completion))
    }

    /// Apply loads until nothing is queued or in flight (including requests issued while
    /// applying). Returns the number of loads applied successfully.
    ///
    /// Failed loads are logged and skipped.
    pub async fn settle(&mut self) -> usize {
        let mut applied = 0;
        while let Some(result) = self.next().await {
            match result {
                Ok(_) => applied += 1,
                Err(err) => warn!(?err, "load failed"),
            }
        }
        applied
    }

    fn apply(&mut self, completion: Completion<L::Value, L::Error>) -> Result<Applied, Error> {
        match completion {
            Completion::Length(Ok(length)) => {
                self.cache.provide_length(length);
                Ok(Applied::Length(length))
            }
            Completion::Length(Err(err)) => {
                self.cache.release_length();
                Err(Error::Load(err.to_string()))
            }
            Completion::Range(window, Ok(page)) => {
                if let Some(total) = page.total {
                    self.cache.provide_length(total);
                }
                let records = page.records.len();
                if let Err(err) = self.cache.provide_range(window, page.records) {
                    // A rejected page frees its window like a failed load
                    self.cache.release(window);
                    return Err(err);
                }
                Ok(Applied::Range { window, records })
            }
            Completion::Range(window, Err(err)) => {
                self.cache.release(window);
                Err(Error::Load(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{init_tracing, Catalog, Record};
    use ella_utils::mocks::ManualClock;
    use futures::executor::block_on;

    const TOTAL: u64 = 103_941;

    fn driver(catalog: &Catalog) -> Driver<Catalog, ManualClock> {
        init_tracing();
        Driver::new(catalog.clone(), ManualClock::default(), Config::default())
    }

    #[test]
    fn test_queue_records_requests() {
        let mut queue = Queue::default();
        assert!(queue.is_empty());
        queue.request_length();
        queue.request_range(Window::new(10, 10));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.requests().count(), 2);
        assert_eq!(
            queue.drain(),
            vec![Request::Length, Request::Range(Window::new(10, 10))]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_settle_fetches_requested_items() {
        let catalog = Catalog::new(TOTAL);
        let mut driver = driver(&catalog);

        assert_eq!(driver.cache_mut().length(), 0);
        driver.cache_mut().get(0);
        driver.cache_mut().get(723);
        assert_eq!(block_on(driver.settle()), 3);
        assert_eq!(driver.in_flight(), 0);

        let cache = driver.cache_mut();
        assert_eq!(cache.length(), TOTAL);
        assert_eq!(cache.slot(0).unwrap().content(), Some(&Record::new(0)));
        assert_eq!(
            cache.slot(723).unwrap().content().unwrap().note,
            "This is item 724"
        );
        assert_eq!(catalog.requests(), 2);
    }

    #[test]
    fn test_peek_does_not_fetch() {
        let catalog = Catalog::new(TOTAL);
        let mut driver = driver(&catalog);

        driver.cache_mut().length();
        driver.cache_mut().peek(0);
        driver.cache_mut().peek(723);
        block_on(driver.settle());

        assert!(driver.cache().slot(0).unwrap().content().is_none());
        assert!(driver.cache().slot(723).unwrap().content().is_none());
        assert_eq!(catalog.requests(), 0);
    }

    #[test]
    fn test_next_reports_each_completion() {
        let catalog = Catalog::new(25);
        let mut driver = driver(&catalog);

        driver.cache_mut().get_many(&[0, 24]);
        assert_eq!(driver.flush(), 2);
        assert_eq!(driver.in_flight(), 2);

        let mut applied = Vec::new();
        while let Some(result) = block_on(driver.next()) {
            applied.push(result.unwrap());
        }
        applied.sort_by_key(|applied| match applied {
            Applied::Range { window, .. } => window.start,
            Applied::Length(_) => u64::MAX,
        });
        assert_eq!(
            applied,
            vec![
                Applied::Range {
                    window: Window::new(0, 10),
                    records: 10
                },
                Applied::Range {
                    window: Window::new(20, 10),
                    records: 5
                },
            ]
        );

        // The page reported the total
        assert!(driver.cache().length_known());
        assert!(driver.cache_mut().get(25).is_none());
    }

    #[test]
    fn test_failed_load_releases_window() {
        let catalog = Catalog::new(TOTAL);
        catalog.fail(Window::new(10, 10));
        let mut driver = driver(&catalog);

        driver.cache_mut().get(12);
        let result = block_on(driver.next()).unwrap();
        assert!(matches!(result, Err(Error::Load(_))));
        assert!(!driver.cache().is_pending(12));
        assert!(!driver.cache().slot(12).unwrap().is_loading());
        assert!(block_on(driver.next()).is_none());

        // Once the source recovers, the next access fetches again
        catalog.recover(Window::new(10, 10));
        driver.cache_mut().get(12);
        assert_eq!(block_on(driver.settle()), 1);
        assert_eq!(
            driver.cache().slot(12).unwrap().content(),
            Some(&Record::new(12))
        );
        assert_eq!(catalog.requests(), 2);
    }

    #[test]
    fn test_failed_length_can_be_requested_again() {
        let catalog = Catalog::new(TOTAL);
        catalog.fail_length(true);
        let mut driver = driver(&catalog);

        driver.cache_mut().length();
        assert!(matches!(block_on(driver.next()), Some(Err(Error::Load(_)))));
        assert!(!driver.cache().is_requesting_length());

        catalog.fail_length(false);
        driver.cache_mut().length();
        assert_eq!(block_on(driver.next()), Some(Ok(Applied::Length(TOTAL))));
        assert_eq!(driver.cache_mut().length(), TOTAL);
    }
}
