use std::path::{Path, PathBuf};
use std::time::Duration;

use fileshare_fetch::DownloadConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShareError};

const DAY_SECS: u64 = 24 * 3600;

/// Settings shared by all items.
///
/// ```toml
/// temp_dir = "/var/tmp/share"
/// thumbnail_size = 96
///
/// [download]
/// documents_dir = "/home/me/Downloads"
/// priority = ["inline", "peer", "ftp", "http"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Where items created from in-memory data are written.
    pub temp_dir:       PathBuf,
    /// Lifetime of cache entries for throwaway payloads.
    pub temp_ttl_secs:  u64,
    /// Lifetime of cache entries for kept files.
    pub file_ttl_secs:  u64,
    /// Edge length of announced thumbnails, in pixels.
    pub thumbnail_size: u32,
    pub download:       DownloadConfig,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            temp_dir:       std::env::temp_dir(),
            temp_ttl_secs:  7 * DAY_SECS,
            file_ttl_secs:  365 * DAY_SECS,
            thumbnail_size: 64,
            download:       DownloadConfig::default(),
        }
    }
}

impl ShareConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> { Ok(toml::from_str(s)?) }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(ShareError::io(path))?;
        Self::from_toml_str(&text)
    }

    pub fn temp_ttl(&self) -> Duration { Duration::from_secs(self.temp_ttl_secs) }

    pub fn file_ttl(&self) -> Duration { Duration::from_secs(self.file_ttl_secs) }
}
