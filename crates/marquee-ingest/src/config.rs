//! Import configuration
//!
//! Values are layered in this order, later sources winning:
//! built-in defaults, an optional TOML file, then `MARQUEE_*` environment
//! variables (a `.env` file in the working directory is loaded first).
//!
//! Nested keys use a double underscore, e.g. `MARQUEE_CRITERIA__GENRE=Comedy`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use marquee_common::{IngestError, Result};
use serde::{Deserialize, Serialize};

use crate::filter::FilterCriteria;

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "MARQUEE";

/// Default directory scanned for dump files.
pub const DEFAULT_IMPORT_DIRECTORY: &str = "./import";

/// Default suffix a file name must carry to be imported.
pub const DEFAULT_FILE_EXTENSION: &str = ".gz";

/// Default number of header lines dropped from every file.
pub const DEFAULT_LINES_TO_SKIP: usize = 1;

/// Default number of files decoded concurrently (lanes).
pub const DEFAULT_CONCURRENT_FILES: usize = 4;

/// Default number of lines parsed concurrently within one lane.
pub const DEFAULT_PARSE_PARALLELISM: usize = 4;

/// Default number of publishes in flight.
pub const DEFAULT_CONCURRENT_WRITES: usize = 8;

/// Default maximum line length in bytes, excluding the delimiter.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1064;

/// Default capacity of the merged record channel.
pub const DEFAULT_OUTPUT_BUFFER: usize = 256;

/// Settings for one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub import_directory: PathBuf,
    pub file_extension: String,
    pub lines_to_skip: usize,
    pub concurrent_files: usize,
    pub parse_parallelism: usize,
    pub concurrent_writes: usize,
    pub max_line_length: usize,
    pub output_buffer: usize,
    /// Title type and genre every published record must match
    #[serde(default)]
    pub criteria: Option<FilterCriteria>,
}

impl ImportConfig {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .set_default("import_directory", DEFAULT_IMPORT_DIRECTORY)
            .and_then(|b| b.set_default("file_extension", DEFAULT_FILE_EXTENSION))
            .and_then(|b| b.set_default("lines_to_skip", DEFAULT_LINES_TO_SKIP as i64))
            .and_then(|b| b.set_default("concurrent_files", DEFAULT_CONCURRENT_FILES as i64))
            .and_then(|b| b.set_default("parse_parallelism", DEFAULT_PARSE_PARALLELISM as i64))
            .and_then(|b| b.set_default("concurrent_writes", DEFAULT_CONCURRENT_WRITES as i64))
            .and_then(|b| b.set_default("max_line_length", DEFAULT_MAX_LINE_LENGTH as i64))
            .and_then(|b| b.set_default("output_buffer", DEFAULT_OUTPUT_BUFFER as i64))
            .map_err(config_error)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: ImportConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let knobs = [
            ("concurrent_files", self.concurrent_files),
            ("parse_parallelism", self.parse_parallelism),
            ("concurrent_writes", self.concurrent_writes),
            ("max_line_length", self.max_line_length),
            ("output_buffer", self.output_buffer),
        ];
        for (name, value) in knobs {
            if value == 0 {
                return Err(IngestError::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.file_extension.is_empty() {
            return Err(IngestError::config("file_extension cannot be empty"));
        }

        if let Some(criteria) = &self.criteria {
            if criteria.title_type.is_empty() || criteria.genre.is_empty() {
                return Err(IngestError::config(
                    "criteria.title_type and criteria.genre cannot be empty",
                ));
            }
        }

        Ok(())
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            import_directory: PathBuf::from(DEFAULT_IMPORT_DIRECTORY),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            lines_to_skip: DEFAULT_LINES_TO_SKIP,
            concurrent_files: DEFAULT_CONCURRENT_FILES,
            parse_parallelism: DEFAULT_PARSE_PARALLELISM,
            concurrent_writes: DEFAULT_CONCURRENT_WRITES,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            output_buffer: DEFAULT_OUTPUT_BUFFER,
            criteria: None,
        }
    }
}

fn config_error(err: config::ConfigError) -> IngestError {
    IngestError::config(err.to_string())
}
