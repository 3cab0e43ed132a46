//! TOML run configuration.
//!
//! ```toml
//! [main]
//! input = "data/in"
//! output = "data/out"              # optional, defaults to <cwd>/output
//! filename_mask = ["btc_", "eth_"] # optional, empty admits every .csv file
//! ```

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::export::output_path;

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Directory under the working directory used when `output` is not set.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Errors from loading and validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config missing [main] table")]
    MissingMainTable,

    #[error("config: input directory is required")]
    MissingInput,

    #[error("cannot resolve default output directory: {0}")]
    CurrentDir(#[source] io::Error),
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    main: Option<MainSection>,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    input: Option<String>,
    output: Option<String>,
    #[serde(default)]
    filename_mask: Vec<String>,
}

/// Resolved run configuration handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory scanned for input `.csv` files.
    pub input_dir: PathBuf,
    /// Directory receiving `median_result.csv`.
    pub output_dir: PathBuf,
    /// Filename substrings; a file qualifies if it contains any of them.
    /// Empty admits every `.csv` file.
    pub filename_masks: Vec<String>,
}

impl AppConfig {
    /// Load and validate a config file.
    ///
    /// A missing `output` resolves against the process working directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let main = parse_main(&content)?;
        resolve(main, || std::env::current_dir().map_err(ConfigError::CurrentDir))
    }

    /// Parse a config from TOML text, resolving a missing `output` under `cwd`.
    pub fn from_toml(content: &str, cwd: &Path) -> Result<Self, ConfigError> {
        let main = parse_main(content)?;
        resolve(main, || Ok(cwd.to_path_buf()))
    }

    /// Full path of the result file inside `output_dir`.
    pub fn output_file(&self) -> PathBuf {
        output_path(&self.output_dir)
    }
}

fn parse_main(content: &str) -> Result<MainSection, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;
    file.main.ok_or(ConfigError::MissingMainTable)
}

fn resolve(
    main: MainSection,
    cwd: impl FnOnce() -> Result<PathBuf, ConfigError>,
) -> Result<AppConfig, ConfigError> {
    let input_dir = match main.input {
        Some(input) if !input.is_empty() => PathBuf::from(input),
        _ => return Err(ConfigError::MissingInput),
    };

    let output_dir = match main.output {
        Some(output) if !output.is_empty() => PathBuf::from(output),
        _ => {
            let dir = cwd()?.join(DEFAULT_OUTPUT_DIR);
            info!(output = %dir.display(), "output not set, using default");
            dir
        }
    };

    let total_masks = main.filename_mask.len();
    let filename_masks: Vec<String> = main
        .filename_mask
        .into_iter()
        .filter(|m| !m.is_empty())
        .collect();
    if filename_masks.len() != total_masks {
        warn!(
            dropped = total_masks - filename_masks.len(),
            "ignoring empty filename_mask entries"
        );
    }

    Ok(AppConfig {
        input_dir,
        output_dir,
        filename_masks,
    })
}
