//! Import orchestrator
//!
//! Wires the stages of one run:
//!
//! ```text
//! enumerator -> balancer(N x gzip lane) -> filter -> publisher -> sink
//! ```
//!
//! and reports how long the run took and what it processed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::{future, stream, StreamExt};
use marquee_common::{IngestError, Result};
use serde::Serialize;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::balancer::Balancer;
use crate::config::ImportConfig;
use crate::context::{PipelineContext, StatsSnapshot};
use crate::enumerator::FileEnumerator;
use crate::filter::RecordFilter;
use crate::lane::{GzipLane, LaneSettings};
use crate::publisher::{PublishSink, PublishSummary, Publisher};

/// Record id reported when the final sink flush fails
const FLUSH_RECORD_ID: &str = "<flush>";

/// Summary of a successful import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}

/// Runs one import from file listing to the last publish
pub struct Orchestrator<E, S> {
    config: Arc<ImportConfig>,
    enumerator: E,
    sink: Arc<S>,
    ctx: PipelineContext,
}

impl<E, S> Orchestrator<E, S>
where
    E: FileEnumerator,
    S: PublishSink + 'static,
{
    pub fn new(config: ImportConfig, enumerator: E, sink: Arc<S>) -> Self {
        Self {
            config: Arc::new(config),
            enumerator,
            sink,
            ctx: PipelineContext::new(),
        }
    }

    /// Use an existing context, e.g. to choose the run id
    pub fn with_context(mut self, ctx: PipelineContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Run the import, logging its terminal outcome
    pub async fn run(&self) -> Result<ImportReport> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let outcome = self.execute().instrument(self.ctx.span().clone()).await;
        let duration = start_time.elapsed();

        let _entered = self.ctx.span().enter();
        match outcome {
            Ok(summary) => {
                let stats = self.ctx.stats().snapshot();
                info!(
                    duration_secs = duration.as_secs_f64(),
                    files = stats.files_listed,
                    parsed = stats.records_parsed,
                    invalid = stats.records_invalid,
                    published = summary.published,
                    "Import finished in {:.3}s",
                    duration.as_secs_f64()
                );
                Ok(ImportReport {
                    run_id: self.ctx.run_id(),
                    started_at,
                    duration,
                    stats,
                })
            },
            Err(e) => {
                error!(
                    error = %e,
                    duration_secs = duration.as_secs_f64(),
                    "Import failed"
                );
                Err(e)
            },
        }
    }

    async fn execute(&self) -> Result<PublishSummary> {
        let files = self.enumerator.list().await?;
        self.ctx.stats().add_files_listed(files.len() as u64);

        info!(
            files = files.len(),
            lanes = self.config.concurrent_files,
            parse_parallelism = self.config.parse_parallelism,
            concurrent_writes = self.config.concurrent_writes,
            criteria = ?self.config.criteria,
            "Starting import"
        );

        let lane = GzipLane::new(LaneSettings::from_config(&self.config));
        let balancer = Balancer::new(
            lane,
            self.config.concurrent_files,
            self.config.output_buffer,
            self.ctx.clone(),
        );
        let filter = RecordFilter::new(self.config.criteria.clone());
        let ctx = self.ctx.clone();

        let accepted = balancer
            .run(stream::iter(files.into_iter().map(Ok)))
            .filter_map(move |item| {
                let kept = match item {
                    Ok(record) => {
                        ctx.stats().observe(&record);
                        filter.apply(record).map(Ok)
                    },
                    Err(e) => Some(Err(e)),
                };
                future::ready(kept)
            });

        let publisher = Publisher::new(
            Arc::clone(&self.sink),
            self.config.concurrent_writes,
            self.ctx.clone(),
        );
        let summary = publisher.publish_all(accepted).await?;

        self.sink
            .flush()
            .await
            .map_err(|e| IngestError::publish(FLUSH_RECORD_ID, e))?;

        Ok(summary)
    }
}
