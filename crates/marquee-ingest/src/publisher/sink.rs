//! Publish sinks
//!
//! A sink is the boundary to whatever consumes accepted records. Two are
//! provided: [`LogSink`] only logs, [`JsonLinesSink`] appends JSON lines to a
//! file.

use std::path::PathBuf;

use async_trait::async_trait;
use marquee_common::{IngestError, PublishError, Result, ValidRecord};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Destination for accepted records
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publish one record
    ///
    /// Called concurrently, up to the configured number of writes in flight.
    async fn publish(&self, record: &ValidRecord) -> std::result::Result<(), PublishError>;

    /// Flush buffered output once every publish has completed
    async fn flush(&self) -> std::result::Result<(), PublishError> {
        Ok(())
    }
}

/// Sink that only logs each record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl PublishSink for LogSink {
    async fn publish(&self, record: &ValidRecord) -> std::result::Result<(), PublishError> {
        info!(
            id = record.id_str(),
            primary_title = record.primary_title.as_deref().unwrap_or_default(),
            "Published record"
        );
        Ok(())
    }
}

/// Sink writing one JSON object per line
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .await
            .map_err(|e| IngestError::resource(&path, e))?;

        debug!(path = %path.display(), "Opened JSON lines output");

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl PublishSink for JsonLinesSink {
    async fn publish(&self, record: &ValidRecord) -> std::result::Result<(), PublishError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        Ok(())
    }

    async fn flush(&self) -> std::result::Result<(), PublishError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        debug!(path = %self.path.display(), "Flushed JSON lines output");
        Ok(())
    }
}
