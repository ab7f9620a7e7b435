use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fileshare_verify::{Digest, DigestSet};
use serde::{Deserialize, Serialize};

use crate::metadata::ItemMetadata;

/// One cached payload, stored under the cache's storage directory or
/// referenced by an external link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub digests:    DigestSet,
    /// Name of the payload file in the storage directory; `None` for links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name:  Option<String>,
    pub size:       u64,
    pub metadata:   ItemMetadata,
    pub expires_at: DateTime<Utc>,
    pub ttl_secs:   u64,
}

impl CacheEntry {
    pub fn new(digests: DigestSet, file_name: Option<String>, size: u64, metadata: ItemMetadata, ttl: Duration) -> Self {
        let mut entry =
            Self { digests, file_name, size, metadata, expires_at: Utc::now(), ttl_secs: ttl.as_secs() };
        entry.touch(Utc::now());
        entry
    }

    pub fn link(&self) -> Option<&Path> { self.metadata.link.as_deref() }

    /// Where the payload lives: the link target, or the stored file.
    pub fn path_in(&self, storage_dir: &Path) -> Option<PathBuf> {
        match (&self.file_name, self.link()) {
            (_, Some(link)) => Some(link.to_path_buf()),
            (Some(name), None) => Some(storage_dir.join(name)),
            (None, None) => None,
        }
    }

    pub fn matches(&self, digest: &Digest) -> bool { self.digests.iter().any(|d| d == digest) }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

    /// Restart the entry's lifetime at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}
