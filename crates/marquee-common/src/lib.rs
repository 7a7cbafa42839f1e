//! Marquee Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, error handling, and logging for the Marquee workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the ingestion error taxonomy and result alias
//! - **Types**: title records (valid and invalid) and input file descriptors
//! - **Logging**: `tracing` subscriber setup shared by all binaries
//!
//! # Example
//!
//! ```no_run
//! use marquee_common::{Record, Result};
//!
//! fn count_valid(records: &[Record]) -> Result<usize> {
//!     Ok(records.iter().filter(|r| r.is_valid()).count())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{FieldParseError, IngestError, PublishError, Result};
pub use types::{InputFile, InvalidRecord, Record, ValidRecord};
