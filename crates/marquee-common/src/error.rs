//! Error types for Marquee
//!
//! Every [`IngestError`] is terminal for the import run. Line-level
//! [`FieldParseError`]s never become one; see its docs.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Main error type for an import run
#[derive(Error, Debug)]
pub enum IngestError {
    /// A file could not be opened, read, or decompressed
    #[error("Resource error on {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line exceeded the maximum frame length
    #[error("Line {line} of {} exceeds the maximum length of {max_length} bytes", .path.display())]
    Framing {
        path: PathBuf,
        line: u64,
        max_length: usize,
    },

    /// The publish sink rejected or failed a record
    #[error("Failed to publish record '{id}': {source}")]
    Publish {
        id: String,
        #[source]
        source: PublishError,
    },

    /// The import directory could not be listed
    #[error("Cannot list import directory {}: {source}", .dir.display())]
    Enumeration {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker task panicked or was aborted
    #[error("Task failure: {0}")]
    Task(String),
}

impl IngestError {
    /// Create a resource error for `path`
    pub fn resource(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            path: path.into(),
            source,
        }
    }

    /// Create a framing error for line `line` of `path`
    pub fn framing(path: impl Into<PathBuf>, line: u64, max_length: usize) -> Self {
        Self::Framing {
            path: path.into(),
            line,
            max_length,
        }
    }

    /// Create a publish error for the record identified by `id`
    pub fn publish(id: impl Into<String>, source: PublishError) -> Self {
        Self::Publish {
            id: id.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a task failure error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

/// Why a single line could not become a valid record
///
/// Recovered where it occurs: the line parser logs it and emits an
/// [`InvalidRecord`](crate::InvalidRecord) carrying the raw first field, so
/// it never aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid {field} '{value}': expected an integer")]
    Integer { field: &'static str, value: String },

    #[error("invalid {field} '{value}': expected a boolean")]
    Boolean { field: &'static str, value: String },
}

/// Failure reported by a publish sink
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("rejected by sink: {0}")]
    Rejected(String),

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PublishError {
    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_error_message() {
        let err = IngestError::framing("/data/title.basics.tsv.gz", 42, 1064);
        assert_eq!(
            err.to_string(),
            "Line 42 of /data/title.basics.tsv.gz exceeds the maximum length of 1064 bytes"
        );
    }

    #[test]
    fn test_field_parse_error_message() {
        let err = FieldParseError::Integer {
            field: "startYear",
            value: "soon".to_string(),
        };
        assert_eq!(err.to_string(), "invalid startYear 'soon': expected an integer");
    }

    #[test]
    fn test_publish_error_keeps_source() {
        let err = IngestError::publish("tt001", PublishError::rejected("queue full"));
        assert_eq!(err.to_string(), "Failed to publish record 'tt001': rejected by sink: queue full");
        assert!(std::error::Error::source(&err).is_some());
    }
}
