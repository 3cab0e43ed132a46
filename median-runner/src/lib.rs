//! Median Runner — run orchestration on top of `median-core`.
//!
//! This crate provides:
//! - TOML configuration loading (`AppConfig`)
//! - Directory scan, filename masks, and parallel per-file ingestion
//! - The `median_result.csv` writer
//! - The `RunObserver` reporting seam and its `tracing` implementation
//! - `run_pipeline`, the end-to-end run

pub mod config;
pub mod export;
pub mod ingest;
pub mod observer;
pub mod pipeline;

pub use config::{AppConfig, ConfigError, DEFAULT_CONFIG_FILE};
pub use export::{export_changes_csv, output_path, ExportError, MedianCsvWriter, OUTPUT_FILE_NAME};
pub use ingest::{
    load_files, load_records, read_file, scan_directory, FileBatch, FilenameFilter, IngestError,
    LineFault, LoadedRecords,
};
pub use observer::{RunObserver, TracingObserver};
pub use pipeline::{run_pipeline, RunError, RunSummary};
