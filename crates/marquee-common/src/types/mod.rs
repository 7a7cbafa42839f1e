//! Common types used across Marquee

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// A fully parsed title line.
///
/// Every field except `genres` is optional: the dump marks absent values with
/// a sentinel, and each column is translated independently.
///
/// # Examples
///
/// ```rust
/// use marquee_common::ValidRecord;
///
/// let record = ValidRecord {
///     id: Some("tt0000001".to_string()),
///     title_type: Some("short".to_string()),
///     primary_title: Some("Carmencita".to_string()),
///     original_title: Some("Carmencita".to_string()),
///     is_adult: Some(false),
///     start_year: Some(1894),
///     end_year: None,
///     runtime_minutes: Some(1),
///     genres: vec!["Documentary".to_string(), "Short".to_string()],
/// };
/// assert!(record.has_genre("Short"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidRecord {
    /// Title identifier (e.g., "tt0000001")
    pub id: Option<String>,

    /// Kind of title (e.g., "movie", "short", "tvSeries")
    pub title_type: Option<String>,

    pub primary_title: Option<String>,

    pub original_title: Option<String>,

    pub is_adult: Option<bool>,

    pub start_year: Option<i32>,

    pub end_year: Option<i32>,

    pub runtime_minutes: Option<i32>,

    /// Genres in source column order, duplicates preserved
    pub genres: Vec<String>,
}

impl ValidRecord {
    /// Identifier, or the empty string when the id column was absent
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Exact, case-sensitive genre membership
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// A line that could not be parsed; keeps only the salvaged first field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub id: String,
}

impl InvalidRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One record per non-header input line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Record {
    Valid(ValidRecord),
    Invalid(InvalidRecord),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Valid(record) => record.id_str(),
            Record::Invalid(record) => &record.id,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Record::Valid(_))
    }

    /// Consume the record, keeping it only if it is valid
    pub fn into_valid(self) -> Option<ValidRecord> {
        match self {
            Record::Valid(record) => Some(record),
            Record::Invalid(_) => None,
        }
    }
}

impl From<ValidRecord> for Record {
    fn from(record: ValidRecord) -> Self {
        Record::Valid(record)
    }
}

impl From<InvalidRecord> for Record {
    fn from(record: InvalidRecord) -> Self {
        Record::Invalid(record)
    }
}

/// A candidate dump file handed from the enumerator to a lane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for log fields, falling back to the full path
    pub fn name(&self) -> Cow<'_, str> {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => self.path.to_string_lossy(),
        }
    }
}
