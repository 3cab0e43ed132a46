//! Directory scan and parallel per-file CSV ingestion.
//!
//! Given an input directory and a filename filter:
//! 1. List regular `.csv` files whose names pass the mask filter, sorted by name
//! 2. Parse each file on the rayon pool, one task per file, nothing shared
//! 3. Join in file-name order; file faults are reported and counted there
//!
//! Row format: `;`-separated, first non-blank line is a header, column 0 is a
//! `u64` timestamp, column 2 an `f64` price, other columns ignored. Bad rows
//! are reported with their physical line number and skipped; the rest of the
//! file continues.

use std::any::Any;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use median_core::Record;
use rayon::prelude::*;
use thiserror::Error;

use crate::observer::RunObserver;

/// Extension (without the dot) a file must have to be ingested.
pub const INPUT_EXTENSION: &str = "csv";

/// Column delimiter of input files.
pub const DELIMITER: u8 = b';';

const LINE_TERMINATOR: u8 = b'\n';

const TIMESTAMP_COLUMN: usize = 0;
const PRICE_COLUMN: usize = 2;
const MIN_COLUMNS: usize = 3;

/// File- and directory-level ingestion faults.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("cannot list input directory {}: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read entry of input directory {}: {source}", path.display())]
    DirectoryEntry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "read error in {} at line {line} after {records} records: {source}",
        path.display()
    )]
    Read {
        path: PathBuf,
        line: u64,
        records: usize,
        #[source]
        source: io::Error,
    },

    #[error("ingestion task for {} panicked: {message}", path.display())]
    TaskPanicked { path: PathBuf, message: String },
}

/// Why a single data row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineFault {
    #[error("invalid CSV format: expected at least 3 columns, found {found}")]
    TooFewColumns { found: usize },

    #[error("failed to parse timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("failed to parse price '{0}'")]
    InvalidPrice(String),

    #[error("non-finite price '{0}'")]
    NonFinitePrice(String),

    #[error("column {column} is not valid UTF-8")]
    Undecodable { column: usize },
}

/// Filename qualification: `.csv` extension plus optional substring masks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameFilter {
    masks: Vec<String>,
}

impl FilenameFilter {
    /// Build a filter; empty mask strings are ignored.
    pub fn new<I, S>(masks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            masks: masks
                .into_iter()
                .map(Into::into)
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Filter admitting every `.csv` file.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn masks(&self) -> &[String] {
        &self.masks
    }

    /// True if `name` ends in `.csv` and contains at least one mask (or no
    /// masks are configured).
    pub fn matches_name(&self, name: &str) -> bool {
        if Path::new(name).extension() != Some(OsStr::new(INPUT_EXTENSION)) {
            return false;
        }
        self.masks.is_empty() || self.masks.iter().any(|m| name.contains(m.as_str()))
    }

    /// True if `path` is a regular file (symlinks followed) whose name matches.
    pub fn qualifies(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|name| self.matches_name(name))
    }
}

/// Records parsed from one file.
#[derive(Debug, Default)]
pub struct FileBatch {
    pub records: Vec<Record>,
    pub lines_skipped: usize,
    /// Read fault that ended the file early; `records` holds the rows before it.
    pub read_error: Option<IngestError>,
}

/// Everything ingested from a directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRecords {
    /// One batch per successfully loaded file, in file-name order.
    pub batches: Vec<Vec<Record>>,
    /// Files that passed the filter.
    pub files_matched: usize,
    /// Matched files that hit a file fault. A fault mid-file still
    /// contributes the rows parsed before it.
    pub files_failed: usize,
    /// Data rows skipped across all files.
    pub lines_skipped: usize,
}

impl LoadedRecords {
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// List qualifying files in `dir`, sorted by path.
///
/// Entries that cannot be read are reported to `observer` and skipped.
pub fn scan_directory(
    dir: &Path,
    filter: &FilenameFilter,
    observer: &dyn RunObserver,
) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.exists() {
        return Err(IngestError::DirectoryMissing(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    Ok(qualifying_paths(
        dir,
        entries.map(|entry| entry.map(|e| e.path())),
        filter,
        observer,
    ))
}

fn qualifying_paths<I>(
    dir: &Path,
    entries: I,
    filter: &FilenameFilter,
    observer: &dyn RunObserver,
) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut files: Vec<PathBuf> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(source) => {
                let error = IngestError::DirectoryEntry {
                    path: dir.to_path_buf(),
                    source,
                };
                observer.on_entry_skipped(dir, &error);
                None
            }
        })
        .filter(|path| filter.qualifies(path))
        .collect();
    files.sort();
    files
}

/// Ingest every qualifying file in `dir` in parallel.
///
/// Never fails: a missing directory yields an empty result, and file or line
/// faults are reported to `observer` and absorbed.
pub fn load_records(
    dir: &Path,
    filter: &FilenameFilter,
    observer: &dyn RunObserver,
) -> LoadedRecords {
    let files = match scan_directory(dir, filter, observer) {
        Ok(files) => files,
        Err(e) => {
            observer.on_directory_unavailable(dir, &e);
            observer.on_records_loaded(0, 0);
            return LoadedRecords::default();
        }
    };
    load_files(&files, observer)
}

/// Ingest `files` in parallel and join the results in the given order.
///
/// Open failures and panicking tasks contribute nothing. A read fault mid-file
/// keeps the rows parsed before it. Both count as failed files.
pub fn load_files(files: &[PathBuf], observer: &dyn RunObserver) -> LoadedRecords {
    let results: Vec<Result<FileBatch, IngestError>> = files
        .par_iter()
        .map(|path| read_file_isolated(path, observer))
        .collect();

    let mut loaded = LoadedRecords {
        files_matched: files.len(),
        ..LoadedRecords::default()
    };
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(FileBatch {
                records,
                lines_skipped,
                read_error,
            }) => {
                match read_error {
                    Some(e) => {
                        observer.on_file_failed(path, &e);
                        loaded.files_failed += 1;
                    }
                    None => observer.on_file_loaded(path, records.len()),
                }
                loaded.lines_skipped += lines_skipped;
                loaded.batches.push(records);
            }
            Err(e) => {
                observer.on_file_failed(path, &e);
                loaded.files_failed += 1;
            }
        }
    }

    observer.on_records_loaded(loaded.record_count(), loaded.files_matched);
    loaded
}

/// Parse one file.
///
/// Fails only if the file cannot be opened. A read error mid-file ends the
/// file; it is returned in [`FileBatch::read_error`] alongside the rows parsed
/// so far. Line numbers are physical and 1-based, blank lines included.
pub fn read_file(path: &Path, observer: &dyn RunObserver) -> Result<FileBatch, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut batch = FileBatch::default();
    let mut header_seen = false;
    let mut line_no: u64 = 0;
    for line in reader.split(LINE_TERMINATOR) {
        line_no += 1;
        let line = match line {
            Ok(line) => line,
            Err(source) => {
                batch.read_error = Some(IngestError::Read {
                    path: path.to_path_buf(),
                    line: line_no,
                    records: batch.records.len(),
                    source,
                });
                break;
            }
        };
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }

        match parse_row(&line) {
            Ok(record) => batch.records.push(record),
            Err(fault) => {
                observer.on_line_skipped(path, line_no, &fault);
                batch.lines_skipped += 1;
            }
        }
    }

    Ok(batch)
}

/// Parse one data line (terminator optional) into a `Record`.
///
/// Fields are split literally on `;` and trimmed. Only the timestamp and
/// price columns have to be valid UTF-8.
pub fn parse_row(line: &[u8]) -> Result<Record, LineFault> {
    let fields: Vec<&[u8]> = line.split(|&b| b == DELIMITER).collect();
    if fields.len() < MIN_COLUMNS {
        return Err(LineFault::TooFewColumns { found: fields.len() });
    }

    let ts_field = decode(fields[TIMESTAMP_COLUMN], TIMESTAMP_COLUMN)?;
    let timestamp: u64 = ts_field
        .parse()
        .map_err(|_| LineFault::InvalidTimestamp(ts_field.to_string()))?;

    let price_field = decode(fields[PRICE_COLUMN], PRICE_COLUMN)?;
    let price: f64 = price_field
        .parse()
        .map_err(|_| LineFault::InvalidPrice(price_field.to_string()))?;
    if !price.is_finite() {
        return Err(LineFault::NonFinitePrice(price_field.to_string()));
    }

    Ok(Record::new(timestamp, price))
}

fn decode(field: &[u8], column: usize) -> Result<&str, LineFault> {
    std::str::from_utf8(field)
        .map(str::trim)
        .map_err(|_| LineFault::Undecodable { column })
}

/// Run [`read_file`], turning a panic into a file fault so sibling tasks
/// are unaffected.
fn read_file_isolated(path: &Path, observer: &dyn RunObserver) -> Result<FileBatch, IngestError> {
    panic::catch_unwind(AssertUnwindSafe(|| read_file(path, observer))).unwrap_or_else(|payload| {
        Err(IngestError::TaskPanicked {
            path: path.to_path_buf(),
            message: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        skipped: Mutex<Vec<(u64, LineFault)>>,
        failed: Mutex<Vec<String>>,
        loaded: Mutex<Vec<PathBuf>>,
        entries: Mutex<Vec<String>>,
    }

    impl RunObserver for Recorder {
        fn on_entry_skipped(&self, _dir: &Path, error: &IngestError) {
            self.entries.lock().unwrap().push(error.to_string());
        }

        fn on_file_failed(&self, _path: &Path, error: &IngestError) {
            self.failed.lock().unwrap().push(error.to_string());
        }

        fn on_file_loaded(&self, path: &Path, _records: usize) {
            self.loaded.lock().unwrap().push(path.to_path_buf());
        }

        fn on_line_skipped(&self, _path: &Path, line: u64, fault: &LineFault) {
            self.skipped.lock().unwrap().push((line, fault.clone()));
        }
    }

    #[test]
    fn filter_requires_csv_extension() {
        let f = FilenameFilter::all();
        assert!(f.matches_name("a.csv"));
        assert!(!f.matches_name("a.txt"));
        assert!(!f.matches_name("a.CSV"));
        assert!(!f.matches_name("a.csv.bak"));
        assert!(!f.matches_name("csv"));
    }

    #[test]
    fn filter_masks_are_or_combined() {
        let f = FilenameFilter::new(["a_", "c_"]);
        assert!(f.matches_name("a_1.csv"));
        assert!(!f.matches_name("b_2.csv"));
        assert!(f.matches_name("c_3.csv"));
        assert!(f.matches_name("xx_a_yy.csv"));
    }

    #[test]
    fn filter_ignores_empty_masks() {
        let f = FilenameFilter::new(["", "a_"]);
        assert_eq!(f.masks(), &["a_".to_string()]);
        assert!(!f.matches_name("b.csv"));
        assert_eq!(FilenameFilter::new([""]), FilenameFilter::all());
    }

    #[test]
    fn parse_row_reads_timestamp_and_price() {
        let r = parse_row(b"1700000000;BTCUSDT;42.5;extra").unwrap();
        assert_eq!(r, Record::new(1_700_000_000, 42.5));
    }

    #[test]
    fn parse_row_rejects_short_rows() {
        assert_eq!(
            parse_row(b"1;x"),
            Err(LineFault::TooFewColumns { found: 2 })
        );
    }

    #[test]
    fn parse_row_rejects_bad_numbers() {
        assert!(matches!(
            parse_row(b"-1;x;1.0"),
            Err(LineFault::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse_row(b"abc;x;1.0"),
            Err(LineFault::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse_row(b"1;x;price"),
            Err(LineFault::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_row(b"1;x;"),
            Err(LineFault::InvalidPrice(_))
        ));
        assert!(matches!(
            parse_row(b"12abc;x;1.0"),
            Err(LineFault::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn parse_row_trims_fields_and_line_ending() {
        assert_eq!(parse_row(b" 7 ; x ; 1.25 \r\n"), Ok(Record::new(7, 1.25)));
    }

    #[test]
    fn parse_row_reports_undecodable_columns() {
        assert_eq!(
            parse_row(b"1\xff;x;1.0"),
            Err(LineFault::Undecodable { column: 0 })
        );
        assert_eq!(
            parse_row(b"1;x;\xfe1.0"),
            Err(LineFault::Undecodable { column: 2 })
        );
        // Columns other than timestamp and price are never decoded.
        assert_eq!(parse_row(b"1;\xff\xfe;1.0"), Ok(Record::new(1, 1.0)));
    }

    #[test]
    fn parse_row_rejects_non_finite_prices() {
        for text in ["NaN", "inf", "-infinity", "1e400"] {
            assert!(
                matches!(
                    parse_row(format!("1;x;{text}").as_bytes()),
                    Err(LineFault::NonFinitePrice(_))
                ),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn read_file_skips_header_and_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(
            &path,
            "receive_ts;symbol;price\n\
             1;X;10.0\n\
             2;X\n\
             abc;X;11.0\n\
             \n\
             3 ; X ; 12.5 \r\n\
             4;X;NaN\n\
             5;X;13.0;ignored\n",
        )
        .unwrap();

        let recorder = Recorder::default();
        let batch = read_file(&path, &recorder).unwrap();

        assert_eq!(
            batch.records,
            vec![
                Record::new(1, 10.0),
                Record::new(3, 12.5),
                Record::new(5, 13.0)
            ]
        );
        assert_eq!(batch.lines_skipped, 3);

        let skipped = recorder.skipped.lock().unwrap();
        let lines: Vec<u64> = skipped.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![3, 4, 7]);
        assert!(recorder.failed.lock().unwrap().is_empty());
        assert!(batch.read_error.is_none());
    }

    #[test]
    fn line_numbers_count_leading_and_repeated_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(
            &path,
            "\nreceive_ts;symbol;price\n\n\n1;X\n2;X;2.0\n  \n3;X;x\n",
        )
        .unwrap();

        let recorder = Recorder::default();
        let batch = read_file(&path, &recorder).unwrap();

        assert_eq!(batch.records, vec![Record::new(2, 2.0)]);
        let skipped = recorder.skipped.lock().unwrap();
        assert_eq!(
            *skipped,
            vec![
                (5, LineFault::TooFewColumns { found: 2 }),
                (8, LineFault::InvalidPrice("x".into())),
            ]
        );
    }

    #[test]
    fn read_fault_is_returned_with_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        // Opening a directory succeeds on Unix; reading from it fails.
        let recorder = Recorder::default();
        let batch = read_file(dir.path(), &recorder).unwrap();

        assert!(batch.records.is_empty());
        assert!(matches!(
            batch.read_error,
            Some(IngestError::Read { line: 1, records: 0, .. })
        ));
        assert!(recorder.failed.lock().unwrap().is_empty());
    }

    #[test]
    fn read_fault_counts_as_failed_file_at_join() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.csv"), "h\n1;X;1.0\n").unwrap();
        std::fs::create_dir(dir.path().join("b.csv")).unwrap();
        let files = vec![dir.path().join("a.csv"), dir.path().join("b.csv")];

        let recorder = Recorder::default();
        let loaded = load_files(&files, &recorder);

        assert_eq!(loaded.files_matched, 2);
        assert_eq!(loaded.files_failed, 1);
        assert_eq!(loaded.batches, vec![vec![Record::new(1, 1.0)], vec![]]);
        assert_eq!(*recorder.loaded.lock().unwrap(), vec![dir.path().join("a.csv")]);
        let failed = recorder.failed.lock().unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].contains("b.csv"), "{failed:?}");
    }

    #[test]
    fn header_only_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "receive_ts;symbol;price\n").unwrap();
        let batch = read_file(&path, &Recorder::default()).unwrap();
        assert!(batch.records.is_empty());
        assert_eq!(batch.lines_skipped, 0);
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("gone.csv"), &Recorder::default()).unwrap_err();
        assert!(matches!(err, IngestError::Open { .. }));
    }

    #[test]
    fn scan_skips_directories_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "h\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "h\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "h\n").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files =
            scan_directory(dir.path(), &FilenameFilter::all(), &Recorder::default()).unwrap();
        let names: Vec<&str> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(OsStr::to_str))
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn scan_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err =
            scan_directory(&missing, &FilenameFilter::all(), &Recorder::default()).unwrap_err();
        assert!(matches!(err, IngestError::DirectoryMissing(_)));
    }

    #[test]
    fn unreadable_entries_are_reported_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "h\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "h\n").unwrap();
        let entries = vec![
            Ok(dir.path().join("b.csv")),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Ok(dir.path().join("a.csv")),
        ];

        let recorder = Recorder::default();
        let files = qualifying_paths(dir.path(), entries, &FilenameFilter::all(), &recorder);

        assert_eq!(files, vec![dir.path().join("a.csv"), dir.path().join("b.csv")]);
        let reported = recorder.entries.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].contains("denied"), "{reported:?}");
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
