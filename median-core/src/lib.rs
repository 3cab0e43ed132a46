//! Median Core — records, the running median accumulator, and change-triggered emission.
//!
//! This crate is free of I/O and threads:
//! - `Record` — one `(timestamp, price)` observation
//! - `order_records` — deterministic global time ordering of per-file batches
//! - `MedianAccumulator` — two-heap running median, insert-only
//! - `ChangeEmitter` — emits a row only when the median moves beyond tolerance

pub mod emitter;
pub mod median;
pub mod ordering;
pub mod record;

pub use emitter::{
    emit_changes, ChangeEmitter, EmissionState, EmissionSummary, MedianChange, CHANGE_TOLERANCE,
};
pub use median::MedianAccumulator;
pub use ordering::order_records;
pub use record::Record;
