//! Ordering stage — merge per-file batches into one time-ordered sequence.

use crate::record::Record;

/// Concatenate `batches` in the given order and sort by ascending timestamp.
///
/// The sort is stable, so records sharing a timestamp keep their arrival
/// order: batch order first, then position within the batch. Batches are
/// moved, not copied.
pub fn order_records(batches: Vec<Vec<Record>>) -> Vec<Record> {
    let total = batches.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    for batch in batches {
        merged.extend(batch);
    }
    merged.sort_by_key(|r| r.timestamp);
    merged
}
