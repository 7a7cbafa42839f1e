//! Parsing lanes
//!
//! A lane turns one input file into a lazy stream of records. The balancer
//! runs a fixed number of lanes concurrently, each working on one file at a
//! time.

pub mod gzip;
pub mod parser;

use futures::stream::BoxStream;
use marquee_common::{InputFile, Record, Result};

pub use gzip::{GzipLane, LaneSettings};
pub use parser::TitleLineParser;

/// Records produced by a lane for a single file
///
/// The stream is finite and cannot be restarted. A fatal error is the last
/// item; dropping the stream releases the file and its decoder.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Per-file decode and parse pipeline
pub trait Lane: Send + Sync + 'static {
    /// Start processing `file`
    ///
    /// Nothing is opened until the returned stream is first polled.
    fn process(&self, file: InputFile) -> RecordStream;
}
