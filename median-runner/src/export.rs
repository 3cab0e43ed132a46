//! Median result export — `median_result.csv`.
//!
//! Format: `;`-separated, `\n` line endings, header `receive_ts;price_median`,
//! one row per emitted change with the median in fixed 8-decimal notation.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use median_core::MedianChange;
use thiserror::Error;

/// File name of the run's result inside the output directory.
pub const OUTPUT_FILE_NAME: &str = "median_result.csv";

/// Header row of the result file.
pub const OUTPUT_HEADER: [&str; 2] = ["receive_ts", "price_median"];

/// Errors writing the result file. All of them are fatal to a run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open output file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write median row: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush median output: {0}")]
    Io(#[from] io::Error),
}

/// Path of the result file inside `output_dir`.
pub fn output_path(output_dir: &Path) -> PathBuf {
    output_dir.join(OUTPUT_FILE_NAME)
}

/// Incremental writer for median change rows.
pub struct MedianCsvWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl MedianCsvWriter<File> {
    /// Create `output_dir` if needed and open `median_result.csv` in it,
    /// truncating any previous result. The header is written immediately.
    pub fn create(output_dir: &Path) -> Result<Self, ExportError> {
        std::fs::create_dir_all(output_dir).map_err(|source| ExportError::CreateDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let path = output_path(output_dir);
        let file = File::create(&path).map_err(|source| ExportError::Open { path, source })?;
        Self::new(file)
    }
}

impl<W: Write> MedianCsvWriter<W> {
    /// Wrap `inner` and write the header row.
    pub fn new(inner: W) -> Result<Self, ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(inner);
        writer.write_record(OUTPUT_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_change(&mut self, change: &MedianChange) -> Result<(), ExportError> {
        self.writer.write_record([
            change.timestamp.to_string(),
            format!("{:.8}", change.median),
        ])?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, ExportError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

/// Render a full result file as a string.
pub fn export_changes_csv(changes: &[MedianChange]) -> Result<String, ExportError> {
    let mut writer = MedianCsvWriter::new(Vec::new())?;
    for change in changes {
        writer.write_change(change)?;
    }
    let data = writer.finish()?;
    String::from_utf8(data)
        .map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}
