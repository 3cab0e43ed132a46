//! Run observer — the reporting seam every pipeline stage writes to.
//!
//! Stages never log on their own; they call the `RunObserver` they were
//! handed. The binary passes [`TracingObserver`], tests pass recorders.
//! Observers are shared with ingestion workers, hence `Sync`.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::ingest::{IngestError, LineFault};

/// Receives advisory events from a run. None of them affect control flow.
///
/// Every method defaults to a no-op so implementors pick what they need.
pub trait RunObserver: Sync {
    /// The input directory is missing or cannot be listed; the run continues
    /// with zero files.
    fn on_directory_unavailable(&self, _dir: &Path, _error: &IngestError) {}

    /// One directory entry could not be read and was left out of the scan.
    fn on_entry_skipped(&self, _dir: &Path, _error: &IngestError) {}

    /// A file hit a fault: open failure, read failure mid-file, or a faulted
    /// ingestion task. Reported at the join point.
    fn on_file_failed(&self, _path: &Path, _error: &IngestError) {}

    /// A data row was skipped. `line` is the 1-based physical line number.
    fn on_line_skipped(&self, _path: &Path, _line: u64, _fault: &LineFault) {}

    /// A file finished loading.
    fn on_file_loaded(&self, _path: &Path, _records: usize) {}

    /// All files are merged.
    fn on_records_loaded(&self, _records: usize, _files: usize) {}

    /// The result file is complete.
    fn on_output_written(&self, _changes: usize, _path: &Path) {}
}

/// Observer that turns events into structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_directory_unavailable(&self, dir: &Path, error: &IngestError) {
        error!(dir = %dir.display(), %error, "input directory unavailable");
    }

    fn on_entry_skipped(&self, dir: &Path, error: &IngestError) {
        warn!(dir = %dir.display(), %error, "skipping unreadable directory entry");
    }

    fn on_file_failed(&self, path: &Path, error: &IngestError) {
        error!(path = %path.display(), %error, "file ingestion failed");
    }

    fn on_line_skipped(&self, path: &Path, line: u64, fault: &LineFault) {
        warn!(path = %path.display(), line, reason = %fault, "skipping line");
    }

    fn on_file_loaded(&self, path: &Path, records: usize) {
        debug!(path = %path.display(), records, "file loaded");
    }

    fn on_records_loaded(&self, records: usize, files: usize) {
        info!(records, files, "records loaded");
    }

    fn on_output_written(&self, changes: usize, path: &Path) {
        info!(changes, "median changes written");
        info!(path = %path.display(), "result saved");
    }
}
