//! Shared fixtures for import integration tests

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use marquee_common::{PublishError, ValidRecord};
use marquee_ingest::{ImportConfig, PublishSink};

pub const HEADER: &str =
    "tconst\ttitleType\tprimaryTitle\toriginalTitle\tisAdult\tstartYear\tendYear\truntimeMinutes\tgenres";

/// Write `content` gzip-compressed to `dir/name`
pub fn write_gzip(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// A well-formed title line
pub fn title_line(id: &str, title_type: &str, genres: &str) -> String {
    format!("{id}\t{title_type}\tTitle {id}\tTitle {id}\t0\t1999\t\\N\t95\t{genres}")
}

/// Dump file with a header and `count` movie/Comedy titles prefixed by `prefix`
pub fn write_dump(dir: &Path, prefix: &str, count: usize) -> PathBuf {
    let mut content = String::from(HEADER);
    for i in 0..count {
        content.push('\n');
        content.push_str(&title_line(&format!("{prefix}{i:05}"), "movie", "Comedy,Drama"));
    }
    content.push('\n');
    write_gzip(dir, &format!("{prefix}.tsv.gz"), &content)
}

/// Config reading from `dir` with small, test-friendly buffers
pub fn test_config(dir: &Path) -> ImportConfig {
    ImportConfig {
        import_directory: dir.to_path_buf(),
        concurrent_files: 2,
        parse_parallelism: 2,
        concurrent_writes: 4,
        output_buffer: 8,
        ..ImportConfig::default()
    }
}

/// Sink keeping every published record in memory
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<ValidRecord>>,
    pub failing_id: Option<String>,
}

impl RecordingSink {
    pub fn failing_on(id: &str) -> Self {
        Self {
            failing_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .published
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id_str().to_string())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl PublishSink for RecordingSink {
    async fn publish(&self, record: &ValidRecord) -> Result<(), PublishError> {
        if self.failing_id.as_deref() == record.id.as_deref() {
            return Err(PublishError::rejected("queue unavailable"));
        }
        self.published.lock().unwrap().push(record.clone());
        Ok(())
    }
}
