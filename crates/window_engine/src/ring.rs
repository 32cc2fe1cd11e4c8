//! Bounded timing-exchange history.
//!
//! A long recording session produces an unbounded stream of timing
//! exchanges, but the offset model only needs a bounded sample of them.
//! `ExchangeBuffer` is a fixed-capacity ring with an overwrite-oldest
//! policy; `ExchangeLog` combines a frozen head (the first N exchanges) with
//! such a ring (the last N), which is all the fitter consumes.

use contracts::TimingExchange;
use ringbuf::{traits::*, HeapRb};

/// Exchanges kept at each end of a session's history.
pub const EXCHANGE_HISTORY: usize = 15;

/// Fixed-capacity ring of timing exchanges, overwrite-oldest on overflow.
pub struct ExchangeBuffer {
    ring: HeapRb<TimingExchange>,
    capacity: usize,
    overwritten: u64,
}

impl std::fmt::Debug for ExchangeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("overwritten", &self.overwritten)
            .finish()
    }
}

impl ExchangeBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            overwritten: 0,
        }
    }

    /// Push an exchange, evicting the oldest when full.
    pub fn push(&mut self, exchange: TimingExchange) {
        if self.ring.is_full() {
            let _ = self.ring.try_pop();
            self.overwritten += 1;
        }
        let _ = self.ring.try_push(exchange);
    }

    /// Contents in arrival order, oldest first.
    pub fn to_ordered_sequence(&self) -> Vec<TimingExchange> {
        self.ring.iter().copied().collect()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Exchanges evicted so far.
    pub fn overwritten_count(&self) -> u64 {
        self.overwritten
    }
}

/// First-N plus last-N exchange history for one station.
///
/// The head fills once and freezes; the tail ring follows the stream. The
/// ordered view deduplicates the overlap while fewer than 2N exchanges have
/// been pushed.
pub struct ExchangeLog {
    head: Vec<TimingExchange>,
    tail: ExchangeBuffer,
    total: u64,
}

impl std::fmt::Debug for ExchangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeLog")
            .field("head", &self.head.len())
            .field("tail", &self.tail.len())
            .field("total", &self.total)
            .finish()
    }
}

impl Default for ExchangeLog {
    fn default() -> Self {
        Self::new(EXCHANGE_HISTORY)
    }
}

impl ExchangeLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            head: Vec::with_capacity(capacity),
            tail: ExchangeBuffer::new(capacity),
            total: 0,
        }
    }

    pub fn push(&mut self, exchange: TimingExchange) {
        if self.head.len() < self.tail.capacity() {
            self.head.push(exchange);
        }
        self.tail.push(exchange);
        self.total += 1;
    }

    pub fn extend(&mut self, exchanges: impl IntoIterator<Item = TimingExchange>) {
        for e in exchanges {
            self.push(e);
        }
    }

    /// Head plus tail in push order, with the overlap removed.
    pub fn to_ordered_sequence(&self) -> Vec<TimingExchange> {
        let cap = self.tail.capacity() as u64;
        // Tail entries with push index < cap are already in the head.
        let skip = (2 * cap).saturating_sub(self.total).min(cap) as usize;

        let mut out = self.head.clone();
        out.extend(self.tail.to_ordered_sequence().into_iter().skip(skip));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Total exchanges ever pushed, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total
    }
}
