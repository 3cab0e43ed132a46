//! End-to-end run: directory → parallel parse → merge → sort → median → CSV.
//!
//! Ingestion is the only parallel phase. Ordering, accumulation and emission
//! run sequentially on the calling thread over one fixed total order, so the
//! emitted rows are reproducible.

use std::path::PathBuf;

use median_core::{order_records, ChangeEmitter};
use thiserror::Error;

use crate::config::AppConfig;
use crate::export::{ExportError, MedianCsvWriter};
use crate::ingest::{load_records, FilenameFilter};
use crate::observer::RunObserver;

/// Faults that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("input directory is required")]
    MissingInputDir,

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Counters of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_matched: usize,
    pub files_failed: usize,
    pub lines_skipped: usize,
    pub records_loaded: usize,
    pub changes_written: usize,
    pub output_path: PathBuf,
}

/// Execute one run against `config`, reporting progress to `observer`.
///
/// Only a missing input directory setting and output failures are errors;
/// ingestion faults are absorbed and show up in the summary counters.
pub fn run_pipeline(config: &AppConfig, observer: &dyn RunObserver) -> Result<RunSummary, RunError> {
    if config.input_dir.as_os_str().is_empty() {
        return Err(RunError::MissingInputDir);
    }

    let filter = FilenameFilter::new(config.filename_masks.iter().map(String::as_str));
    let loaded = load_records(&config.input_dir, &filter, observer);
    let files_matched = loaded.files_matched;
    let files_failed = loaded.files_failed;
    let lines_skipped = loaded.lines_skipped;

    let ordered = order_records(loaded.batches);

    let output_path = config.output_file();
    let mut writer = MedianCsvWriter::create(&config.output_dir)?;
    let mut emitter = ChangeEmitter::new();
    for record in &ordered {
        if let Some(change) = emitter.observe(record) {
            writer.write_change(&change)?;
        }
    }
    writer.finish()?;

    let emission = emitter.finish();
    observer.on_output_written(emission.changes, &output_path);

    Ok(RunSummary {
        files_matched,
        files_failed,
        lines_skipped,
        records_loaded: emission.records_processed,
        changes_written: emission.changes,
        output_path,
    })
}
