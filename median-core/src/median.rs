//! Running median over an insert-only stream of prices.
//!
//! Two heaps partition everything seen so far:
//! - `low` — a max-heap holding the lower half, exposing its maximum
//! - `high` — a min-heap holding the upper half, exposing its minimum
//!
//! After every insert the partition sizes differ by at most one and
//! `max(low) <= min(high)`. Insert is O(log n), query is O(1). Values are
//! never removed.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Heap key for prices. Ordered by `f64::total_cmp` so the heaps always see
/// a total order, even for values the ingestion stage should have rejected.
#[derive(Debug, Clone, Copy)]
struct HeapPrice(f64);

impl PartialEq for HeapPrice {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapPrice {}

impl PartialOrd for HeapPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapPrice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Incremental median of all prices added so far.
#[derive(Debug, Clone, Default)]
pub struct MedianAccumulator {
    low: BinaryHeap<HeapPrice>,
    high: BinaryHeap<Reverse<HeapPrice>>,
}

impl MedianAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one price and rebalance the partitions.
    ///
    /// Routing compares against `max(low)` with plain IEEE `<=`; an empty low
    /// partition takes the value.
    pub fn add(&mut self, price: f64) {
        let above_low = self.low.peek().is_some_and(|top| price > top.0);
        if above_low {
            self.high.push(Reverse(HeapPrice(price)));
        } else {
            self.low.push(HeapPrice(price));
        }
        self.rebalance();
    }

    /// Median of everything added so far, or `None` before the first value.
    ///
    /// Equal partitions give the mean of the two boundary values; otherwise
    /// the boundary of the larger partition is the median.
    pub fn median(&self) -> Option<f64> {
        let low = self.low.peek().map(|p| p.0);
        let high = self.high.peek().map(|Reverse(p)| p.0);
        match self.low.len().cmp(&self.high.len()) {
            Ordering::Equal => Some((low? + high?) / 2.0),
            Ordering::Greater => low,
            Ordering::Less => high,
        }
    }

    /// Number of prices added.
    pub fn len(&self) -> usize {
        self.low.len() + self.high.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low.is_empty() && self.high.is_empty()
    }

    /// Sizes of the `(low, high)` partitions.
    pub fn partition_sizes(&self) -> (usize, usize) {
        (self.low.len(), self.high.len())
    }

    fn rebalance(&mut self) {
        if self.low.len() > self.high.len() + 1 {
            if let Some(top) = self.low.pop() {
                self.high.push(Reverse(top));
            }
        } else if self.high.len() > self.low.len() + 1 {
            if let Some(Reverse(bottom)) = self.high.pop() {
                self.low.push(bottom);
            }
        }
    }
}
