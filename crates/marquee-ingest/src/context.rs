//! Per-run logging context and counters
//!
//! Every pipeline component is constructed with a [`PipelineContext`] and
//! enters its span (or instruments its tasks with it), so all events of one
//! run carry the same `run_id` without any global logger state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use marquee_common::Record;
use serde::Serialize;
use tracing::Span;
use uuid::Uuid;

/// Logging handle shared by the stages of one import run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    run_id: Uuid,
    span: Span,
    stats: Arc<ImportStats>,
}

impl PipelineContext {
    /// Create a context with a fresh run id
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        let span = tracing::info_span!("import", run_id = %run_id);
        Self {
            run_id,
            span,
            stats: Arc::new(ImportStats::default()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn stats(&self) -> &ImportStats {
        &self.stats
    }

    /// Span for one lane worker, parented to the run span
    pub fn lane_span(&self, lane: usize) -> Span {
        tracing::info_span!(parent: &self.span, "lane", lane)
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free counters updated by the pipeline stages
#[derive(Debug, Default)]
pub struct ImportStats {
    files_listed: AtomicU64,
    records_parsed: AtomicU64,
    records_invalid: AtomicU64,
    records_accepted: AtomicU64,
    records_published: AtomicU64,
}

impl ImportStats {
    pub fn add_files_listed(&self, count: u64) {
        self.files_listed.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a record coming out of a lane
    pub fn observe(&self, record: &Record) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
        if !record.is_valid() {
            self.records_invalid.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_published(&self) {
        self.records_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_listed: self.files_listed.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            records_invalid: self.records_invalid.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ImportStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files_listed: u64,
    pub records_parsed: u64,
    pub records_invalid: u64,
    pub records_accepted: u64,
    pub records_published: u64,
}
