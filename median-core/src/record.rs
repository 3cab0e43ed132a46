//! Record — the unit carried from ingestion to the median engine.

/// One `(timestamp, price)` observation extracted from an input row.
///
/// Records have no identity beyond their two fields; several records may share
/// a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub timestamp: u64,
    pub price: f64,
}

impl Record {
    pub fn new(timestamp: u64, price: f64) -> Self {
        Self { timestamp, price }
    }
}
