//! Change-triggered emission of the running median.
//!
//! Records are fed in global time order. Every record's price goes into the
//! accumulator; a [`MedianChange`] is produced only when the new median
//! differs from the last emitted one by more than [`CHANGE_TOLERANCE`]. The
//! first record always emits.

use std::fmt;

use crate::median::MedianAccumulator;
use crate::record::Record;

/// Absolute difference above which two medians count as different.
pub const CHANGE_TOLERANCE: f64 = 1e-9;

/// One emitted output row: the record's timestamp and the median after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MedianChange {
    pub timestamp: u64,
    pub median: f64,
}

impl fmt::Display for MedianChange {
    /// `<timestamp>;<median with 8 decimals>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{:.8}", self.timestamp, self.median)
    }
}

/// Mutable per-run emission state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionState {
    /// `None` until the first emission.
    pub last_emitted: Option<f64>,
    pub change_count: usize,
}

impl EmissionState {
    /// Whether `median` should be emitted given the last emitted value.
    pub fn is_change(&self, median: f64) -> bool {
        match self.last_emitted {
            None => true,
            Some(last) => (median - last).abs() > CHANGE_TOLERANCE,
        }
    }
}

/// Final counters of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionSummary {
    pub records_processed: usize,
    pub changes: usize,
}

/// Drives records through a [`MedianAccumulator`] and decides what to emit.
///
/// Owns the accumulator for the whole run; nothing else reads or mutates it.
#[derive(Debug, Clone, Default)]
pub struct ChangeEmitter {
    accumulator: MedianAccumulator,
    state: EmissionState,
    records_processed: usize,
}

impl ChangeEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one record; return the row to write if the median changed.
    pub fn observe(&mut self, record: &Record) -> Option<MedianChange> {
        self.accumulator.add(record.price);
        self.records_processed += 1;

        let median = self.accumulator.median()?;
        if !self.state.is_change(median) {
            return None;
        }

        self.state.last_emitted = Some(median);
        self.state.change_count += 1;
        Some(MedianChange {
            timestamp: record.timestamp,
            median,
        })
    }

    pub fn state(&self) -> &EmissionState {
        &self.state
    }

    pub fn accumulator(&self) -> &MedianAccumulator {
        &self.accumulator
    }

    pub fn records_processed(&self) -> usize {
        self.records_processed
    }

    /// Consume the emitter and report the run's counters.
    pub fn finish(self) -> EmissionSummary {
        EmissionSummary {
            records_processed: self.records_processed,
            changes: self.state.change_count,
        }
    }
}

/// Run every record through a fresh emitter and collect the emitted rows.
pub fn emit_changes<'a, I>(records: I) -> (Vec<MedianChange>, EmissionSummary)
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut emitter = ChangeEmitter::new();
    let changes = records
        .into_iter()
        .filter_map(|r| emitter.observe(r))
        .collect();
    (changes, emitter.finish())
}
