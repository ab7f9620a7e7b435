use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::source::SourcePriority;

/// Settings for [`Downloader`](crate::Downloader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Directory finished downloads are placed in.
    pub documents_dir:  PathBuf,
    /// Marker prepended to the destination name for the staging file.
    pub staging_prefix: String,
    /// Buffer size used by [`Downloader::drive`](crate::Downloader::drive).
    pub read_chunk:     usize,
    pub priority:       SourcePriority,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            documents_dir:  default_documents_dir(),
            staging_prefix: "dl-".to_string(),
            read_chunk:     64 * 1024,
            priority:       SourcePriority::default(),
        }
    }
}

impl DownloadConfig {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self { documents_dir: documents_dir.into(), ..Self::default() }
    }

    pub fn staging_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.staging_prefix = prefix.into();
        self
    }

    pub fn read_chunk(mut self, size: usize) -> Self {
        self.read_chunk = size;
        self
    }

    pub fn priority(mut self, priority: SourcePriority) -> Self {
        self.priority = priority;
        self
    }
}

fn default_documents_dir() -> PathBuf {
    home::home_dir()
        .map(|home| home.join("Documents"))
        .unwrap_or_else(std::env::temp_dir)
}
