//! Marquee Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Balanced parallel import of gzip-compressed, tab-separated title dumps.
//!
//! # Pipeline
//!
//! - **Enumerator**: lists the dump files of the import directory
//! - **Balancer**: hands each file to whichever lane is idle and merges their output
//! - **Lane**: decompresses, frames and parses one file into records
//! - **Filter**: keeps valid records matching the title type and genre criteria
//! - **Publisher**: forwards accepted records to a sink with bounded concurrency
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use marquee_ingest::{DirectoryEnumerator, ImportConfig, LogSink, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::load(None)?;
//!     let enumerator = DirectoryEnumerator::new(&config.import_directory, &config.file_extension);
//!     let report = Orchestrator::new(config, enumerator, Arc::new(LogSink)).run().await?;
//!     println!("published {}", report.stats.records_published);
//!     Ok(())
//! }
//! ```

pub mod balancer;
pub mod config;
pub mod context;
pub mod enumerator;
pub mod filter;
pub mod lane;
pub mod orchestrator;
pub mod publisher;
pub mod runtime;

pub use balancer::{BalancedStream, Balancer};
pub use config::ImportConfig;
pub use context::{ImportStats, PipelineContext, StatsSnapshot};
pub use enumerator::{DirectoryEnumerator, FileEnumerator};
pub use filter::{FilterCriteria, RecordFilter};
pub use lane::{GzipLane, Lane, LaneSettings, RecordStream, TitleLineParser};
pub use orchestrator::{ImportReport, Orchestrator};
pub use publisher::{JsonLinesSink, LogSink, PublishSink, PublishSummary, Publisher};
pub use runtime::{build_runtime, run_to_completion};
