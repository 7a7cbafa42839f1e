//! Input file discovery
//!
//! The listing is a single eager batch taken before any lane starts.

use std::path::PathBuf;

use async_trait::async_trait;
use marquee_common::{IngestError, InputFile, Result};
use tracing::debug;

/// Source of the finite set of files an import run processes
#[async_trait]
pub trait FileEnumerator: Send + Sync {
    /// List the files to import
    ///
    /// Failing here is a startup error: no lane has been started yet.
    async fn list(&self) -> Result<Vec<InputFile>>;
}

/// Non-recursive listing of one directory, filtered by file name suffix
#[derive(Debug, Clone)]
pub struct DirectoryEnumerator {
    dir: PathBuf,
    extension: String,
}

impl DirectoryEnumerator {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    fn enumeration_error(&self, source: std::io::Error) -> IngestError {
        IngestError::Enumeration {
            dir: self.dir.clone(),
            source,
        }
    }
}

#[async_trait]
impl FileEnumerator for DirectoryEnumerator {
    async fn list(&self) -> Result<Vec<InputFile>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.enumeration_error(e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.enumeration_error(e))?
        {
            let path = entry.path();

            // Suffix match on the raw name, so ".tsv.gz" works as well as ".gz"
            let matches = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().ends_with(&self.extension));
            if !matches {
                continue;
            }

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| self.enumeration_error(e))?;
            if !metadata.is_file() {
                debug!(path = %path.display(), "Skipping non-file entry");
                continue;
            }

            files.push(InputFile::new(path, metadata.len()));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            dir = %self.dir.display(),
            extension = %self.extension,
            count = files.len(),
            "Listed input files"
        );

        Ok(files)
    }
}
