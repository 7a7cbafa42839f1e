//! Title dump line parser
//!
//! # File Format
//! One title per line, nine tab-separated columns:
//!
//! ```text
//! tconst  titleType  primaryTitle  originalTitle  isAdult  startYear  endYear  runtimeMinutes  genres
//! tt0000001  short  Carmencita  Carmencita  0  1894  \N  1  Documentary,Short
//! ```
//!
//! `\N` marks an absent value in any column. Genres are comma separated.

use marquee_common::{FieldParseError, InvalidRecord, Record, ValidRecord};
use tracing::warn;

/// Marker for an absent value
pub const NULL_SENTINEL: &str = "\\N";

/// Number of columns in a title line
pub const FIELD_COUNT: usize = 9;

const FIELD_DELIMITER: char = '\t';
const GENRE_DELIMITER: char = ',';

/// Parser for single title lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleLineParser;

impl TitleLineParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a line, recovering any field error into an [`InvalidRecord`]
    ///
    /// The invalid record keeps the raw first column (possibly empty).
    pub fn parse_line(&self, line: &str, line_num: u64) -> Record {
        match self.try_parse(line) {
            Ok(record) => Record::Valid(record),
            Err(e) => {
                warn!(line = line_num, error = %e, content = %line, "Unable to parse title line");
                let id = line.split(FIELD_DELIMITER).next().unwrap_or_default();
                Record::Invalid(InvalidRecord::new(id))
            },
        }
    }

    /// Parse a line into a valid record
    pub fn try_parse(&self, line: &str) -> Result<ValidRecord, FieldParseError> {
        // Empty columns are kept, so "a\t\t" has three fields
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(FieldParseError::FieldCount {
                expected: FIELD_COUNT,
                found: fields.len(),
            });
        }

        Ok(ValidRecord {
            id: text(fields[0]),
            title_type: text(fields[1]),
            primary_title: text(fields[2]),
            original_title: text(fields[3]),
            is_adult: boolean("isAdult", fields[4])?,
            start_year: integer("startYear", fields[5])?,
            end_year: integer("endYear", fields[6])?,
            runtime_minutes: integer("runtimeMinutes", fields[7])?,
            genres: genres(fields[8]),
        })
    }
}

fn absent(value: &str) -> bool {
    value == NULL_SENTINEL
}

fn text(value: &str) -> Option<String> {
    (!absent(value)).then(|| value.to_string())
}

fn integer(field: &'static str, value: &str) -> Result<Option<i32>, FieldParseError> {
    if absent(value) {
        return Ok(None);
    }
    value
        .parse::<i32>()
        .map(Some)
        .map_err(|_| FieldParseError::Integer {
            field,
            value: value.to_string(),
        })
}

fn boolean(field: &'static str, value: &str) -> Result<Option<bool>, FieldParseError> {
    if absent(value) {
        return Ok(None);
    }
    match value {
        "0" => Ok(Some(false)),
        "1" => Ok(Some(true)),
        v if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
        v if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
        _ => Err(FieldParseError::Boolean {
            field,
            value: value.to_string(),
        }),
    }
}

fn genres(value: &str) -> Vec<String> {
    if absent(value) {
        return Vec::new();
    }
    value.split(GENRE_DELIMITER).map(str::to_string).collect()
}
