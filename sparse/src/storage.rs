use crate::{metrics::Metrics, Config, Error, Event, Slot, Source, Target, Window};
use ella_utils::Clock;
use futures::channel::mpsc;
use prometheus_client::registry::Registry;
use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU64,
    time::{Duration, SystemTime},
};
use tracing::{debug, trace, warn};

/// A lazily fetched, windowed view over a remote collection.
///
/// See the [crate] documentation for an overview.
pub struct Cache<V, S: Source, C: Clock> {
    source: S,
    clock: C,

    window_size: NonZeroU64,
    ttl: Duration,
    streaming: bool,

    /// Total number of records, once delivered.
    length: Option<u64>,

    /// Whether a length request is outstanding.
    requesting_length: bool,

    /// Slots delivered before this marker are expired.
    expired: u64,

    slots: BTreeMap<u64, Slot<V>>,

    /// Starts of the windows with an outstanding request.
    pending: BTreeSet<u64>,

    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    metrics: Metrics,
}

impl<V, S: Source, C: Clock> Cache<V, S, C> {
    /// Create a new, empty cache that fetches through `source`.
    pub fn new(source: S, clock: C, cfg: Config) -> Self {
        Self {
            source,
            clock,
            window_size: cfg.window_size,
            ttl: cfg.ttl,
            streaming: cfg.streaming,
            length: None,
            requesting_length: false,
            expired: 0,
            slots: BTreeMap::new(),
            pending: BTreeSet::new(),
            subscribers: Vec::new(),
            metrics: Metrics::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn window_size(&self) -> NonZeroU64 {
        self.window_size
    }

    /// Change the number of indices fetched per request.
    ///
    /// Outstanding requests are tracked by window, so the size can only change while no window
    /// is pending.
    pub fn set_window_size(&mut self, window_size: NonZeroU64) -> Result<(), Error> {
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "rejecting window resize");
            return Err(Error::WindowsPending(self.pending.len()));
        }
        self.window_size = window_size;
        Ok(())
    }

    /// Returns the time-to-live inherited by new slots.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the time-to-live inherited by slots created from now on.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Returns whether the length has been delivered.
    pub fn length_known(&self) -> bool {
        self.length.is_some()
    }

    pub fn is_requesting_length(&self) -> bool {
        self.requesting_length
    }

    /// Returns the current expiry marker.
    pub fn expired(&self) -> u64 {
        self.expired
    }

    /// Returns the windows with an outstanding request, in index order.
    pub fn pending(&self) -> impl Iterator<Item = u64> + '_ {
        self.pending.iter().copied()
    }

    /// Returns whether the window containing `index` has an outstanding request.
    pub fn is_pending(&self, index: u64) -> bool {
        self.pending.contains(&self.window_start(index))
    }

    /// Returns the number of materialized slots.
    pub fn materialized(&self) -> usize {
        self.slots.len()
    }

    /// Returns the total number of records (`0` while unknown).
    ///
    /// If the length is unknown and not already being discovered, asks the [Source] for it.
    pub fn length(&mut self) -> u64 {
        if let Some(length) = self.length {
            return length;
        }
        if !self.requesting_length {
            self.requesting_length = true;
            self.metrics.length_requests.inc();
            debug!("requesting length");
            self.source.request_length();
        }
        0
    }

    /// Deliver the total number of records.
    ///
    /// May be called at any time, including speculatively or repeatedly.
    pub fn provide_length(&mut self, length: u64) {
        self.requesting_length = false;
        if self.length == Some(length) {
            return;
        }
        debug!(length, "length resolved");
        self.length = Some(length);
        self.notify(Event::LengthResolved(length));
    }

    /// Abandon an outstanding length request without a result, allowing a new one to be issued.
    pub fn release_length(&mut self) {
        self.requesting_length = false;
    }

    /// Returns the slot for `index`, creating it if needed and fetching its window if it is not
    /// fresh (when streaming).
    ///
    /// Returns `None` if `index` is beyond the known length. While the length is unknown, every
    /// index below `u64::MAX` is speculatively in range.
    pub fn get(&mut self, index: u64) -> Option<&Slot<V>> {
        self.access(index, self.streaming)
    }

    /// Like [Self::get], but never triggers a fetch.
    ///
    /// The slot is still created if it does not exist.
    pub fn peek(&mut self, index: u64) -> Option<&Slot<V>> {
        self.access(index, false)
    }

    /// Returns the slot for `index` if it exists, without creating it or fetching.
    pub fn slot(&self, index: u64) -> Option<&Slot<V>> {
        if !self.in_range(index) {
            return None;
        }
        self.slots.get(&index)
    }

    /// Returns a mutable reference to an existing slot (e.g. to override its time-to-live).
    pub fn slot_mut(&mut self, index: u64) -> Option<&mut Slot<V>> {
        if !self.in_range(index) {
            return None;
        }
        self.slots.get_mut(&index)
    }

    /// Returns the slots for `indices`, in order (repeats allowed).
    ///
    /// Each window touched by `indices` is considered for fetching once.
    pub fn get_many(&mut self, indices: &[u64]) -> Vec<Option<&Slot<V>>> {
        let mut considered = BTreeSet::new();
        for &index in indices {
            if !self.in_range(index) {
                continue;
            }
            self.materialize(index);
            if self.streaming && considered.insert(self.window_start(index)) {
                self.ensure_window_fetched(index);
            }
        }
        self.metrics.slots.set(self.slots.len() as i64);

        let this = &*self;
        indices.iter().map(|index| this.slot(*index)).collect()
    }

    /// Returns the slot at index `0`.
    pub fn first(&mut self) -> Option<&Slot<V>> {
        self.get(0)
    }

    /// Returns the slot at index `length - 1`, or `None` while the length is unknown or zero.
    pub fn last(&mut self) -> Option<&Slot<V>> {
        match self.length {
            Some(length) if length > 0 => self.get(length - 1),
            _ => None,
        }
    }

    /// Returns whether the slot at `index` is stale, if it exists.
    pub fn is_stale(&self, index: u64) -> Option<bool> {
        let now = self.clock.current();
        self.slot(index).map(|slot| slot.is_stale(now))
    }

    /// Returns whether the slot at `index` is expired relative to the current marker, if it
    /// exists.
    pub fn is_expired(&self, index: u64) -> Option<bool> {
        self.slot(index).map(|slot| slot.is_expired_at(self.expired))
    }

    /// Deliver the records fetched for `window`.
    ///
    /// `records[i]` is written to index `window.start + i`. Fewer records than requested means
    /// fewer exist: the remaining slots keep their content and are no longer loading. Records
    /// at or beyond the known length are dropped. Every pending window overlapping `window` is
    /// resolved.
    pub fn provide_range(&mut self, window: Window, records: Vec<V>) -> Result<(), Error> {
        if window.end().is_none() {
            warn!(%window, "rejecting delivery");
            return Err(Error::WindowOverflow(window));
        }
        if records.len() as u64 > window.length {
            warn!(%window, records = records.len(), "rejecting delivery");
            return Err(Error::TooManyRecords {
                window,
                records: records.len(),
            });
        }

        let now = self.clock.current();
        let (ttl, epoch) = (self.ttl, self.expired);
        let mut delivered = 0u64;
        for (index, record) in window.indices().zip(records) {
            // Records past the known length are unreachable
            if !self.in_range(index) {
                break;
            }
            delivered += 1;
            self.slots
                .entry(index)
                .or_insert_with(|| Slot::new(ttl))
                .deliver(record, now, epoch);
            trace!(index, "slot updated");
            self.notify(Event::SlotUpdated(index));
        }
        self.resolve(window);

        self.metrics.deliveries.inc();
        self.metrics.records.inc_by(delivered);
        self.metrics.slots.set(self.slots.len() as i64);
        debug!(%window, delivered, "range delivered");
        Ok(())
    }

    /// Abandon the outstanding request(s) overlapping `window` without delivering content.
    ///
    /// Slots stop loading and keep whatever content they had, so a later access may request
    /// the window again. Returns whether any request was outstanding.
    pub fn release(&mut self, window: Window) -> bool {
        let released = self.resolve(window);
        if released > 0 {
            debug!(%window, released, "released pending windows");
        }
        released > 0
    }

    /// Clear the content of every existing slot selected by `targets`.
    ///
    /// Indices without a slot are ignored. Returns the number of slots whose content was
    /// cleared.
    pub fn unset<T: Into<Target>>(
        &mut self,
        targets: impl IntoIterator<Item = T>,
    ) -> Result<usize, Error> {
        let ranges = Target::normalize(targets.into_iter().map(Into::<Target>::into))?;
        let mut cleared = Vec::new();
        for range in ranges {
            for (index, slot) in self.slots.range_mut(range) {
                if slot.invalidate() {
                    cleared.push(*index);
                }
            }
        }
        for &index in &cleared {
            trace!(index, "slot invalidated");
            self.notify(Event::SlotInvalidated(index));
        }
        self.metrics.invalidations.inc_by(cleared.len() as u64);
        Ok(cleared.len())
    }

    /// Advance the expiry marker, expiring every slot delivered before now.
    ///
    /// Content stays readable; the next access to an expired slot fetches its window again.
    /// Returns the new marker.
    pub fn expire(&mut self) -> u64 {
        self.expired += 1;
        self.metrics.expirations.inc();
        debug!(marker = self.expired, "expired all slots");
        self.notify(Event::Expired(self.expired));
        self.expired
    }

    /// Subscribe to state transitions.
    ///
    /// Subscribers that drop their receiver are forgotten on the next event.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Register this cache's metrics with `registry`.
    pub fn register(&self, registry: &mut Registry) {
        self.metrics.register(registry);
    }

    fn window_start(&self, index: u64) -> u64 {
        let size = self.window_size.get();
        (index / size) * size
    }

    /// Returns the window containing `index`, clipped to the known length.
    fn window_of(&self, index: u64) -> Window {
        let start = self.window_start(index);
        let mut length = self.window_size.get();
        if let Some(total) = self.length {
            length = length.min(total.saturating_sub(start));
        }
        // Never extend past the end of the index space
        length = length.min(u64::MAX - start);
        Window::new(start, length)
    }

    /// The last addressable index is `u64::MAX - 1`, so every index fits in a [Window].
    fn in_range(&self, index: u64) -> bool {
        index < u64::MAX && self.length.is_none_or(|length| index < length)
    }

    fn materialize(&mut self, index: u64) {
        let ttl = self.ttl;
        self.slots.entry(index).or_insert_with(|| Slot::new(ttl));
    }

    fn access(&mut self, index: u64, fetch: bool) -> Option<&Slot<V>> {
        if !self.in_range(index) {
            return None;
        }
        self.materialize(index);
        if fetch {
            self.ensure_window_fetched(index);
        }
        self.metrics.slots.set(self.slots.len() as i64);
        self.slots.get(&index)
    }

    /// Requests the window containing `index` unless it is pending or entirely fresh.
    ///
    /// Returns whether a request was issued.
    fn ensure_window_fetched(&mut self, index: u64) -> bool {
        let window = self.window_of(index);
        if self.pending.contains(&window.start) {
            trace!(%window, "window already pending");
            return false;
        }
        let now = self.clock.current();
        if self.is_window_fresh(window, now) {
            return false;
        }

        self.pending.insert(window.start);
        let ttl = self.ttl;
        for index in window.indices() {
            self.slots
                .entry(index)
                .or_insert_with(|| Slot::new(ttl))
                .set_loading(true);
        }
        self.metrics.range_requests.inc();
        self.metrics.pending_windows.set(self.pending.len() as i64);
        self.metrics.slots.set(self.slots.len() as i64);
        debug!(%window, "requesting range");
        self.source.request_range(window);
        self.notify(Event::RangeRequested(window));
        true
    }

    fn is_window_fresh(&self, window: Window, now: SystemTime) -> bool {
        window.indices().all(|index| {
            self.slots
                .get(&index)
                .is_some_and(|slot| slot.is_fresh(now, self.expired))
        })
    }

    /// Clears the pending flag of every window overlapping `window` and stops the covered slots
    /// from loading. Returns the number of windows that were pending.
    fn resolve(&mut self, window: Window) -> usize {
        let first = self.window_start(window.start);
        let last = window.end().unwrap_or(u64::MAX).max(window.start.saturating_add(1));
        let resolved: Vec<u64> = self.pending.range(first..last).copied().collect();

        let size = self.window_size.get();
        for start in &resolved {
            self.pending.remove(start);
            let end = start.saturating_add(size);
            for (_, slot) in self.slots.range_mut(*start..end) {
                slot.set_loading(false);
            }
        }
        for (_, slot) in self.slots.range_mut(window.indices()) {
            slot.set_loading(false);
        }
        self.metrics.pending_windows.set(self.pending.len() as i64);
        resolved.len()
    }

    fn notify(&mut self, event: Event) {
        self.subscribers
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }
}
