//! Record filter
//!
//! Invalid records never pass. With criteria, a valid record passes only when
//! its title type equals the requested one and its genres contain the
//! requested genre; both comparisons are exact and case-sensitive.

use marquee_common::{Record, ValidRecord};
use serde::{Deserialize, Serialize};

/// Title type and genre a record must match to be published
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub title_type: String,
    pub genre: String,
}

impl FilterCriteria {
    pub fn new(title_type: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            title_type: title_type.into(),
            genre: genre.into(),
        }
    }

    pub fn matches(&self, record: &ValidRecord) -> bool {
        record.title_type.as_deref() == Some(self.title_type.as_str())
            && record.has_genre(&self.genre)
    }
}

/// Stateless predicate applied to the merged record stream
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    criteria: Option<FilterCriteria>,
}

impl RecordFilter {
    pub fn new(criteria: Option<FilterCriteria>) -> Self {
        Self { criteria }
    }

    /// Filter that keeps every valid record
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn accepts(&self, record: &ValidRecord) -> bool {
        self.criteria
            .as_ref()
            .map_or(true, |criteria| criteria.matches(record))
    }

    /// Keep the record if it is valid and matches the criteria
    pub fn apply(&self, record: Record) -> Option<ValidRecord> {
        record.into_valid().filter(|valid| self.accepts(valid))
    }
}
