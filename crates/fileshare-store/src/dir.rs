//! Directory-backed cache.
//!
//! Payloads are files named by the hex of their first digest. A json index
//! next to them maps digests to entries and is replaced atomically on every
//! change. Expired entries stay on disk until revived; eviction is left to
//! the owner of the directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use fileshare_fs::{AtomicWriteOptions, atomic_write, move_file, split_name};
use fileshare_verify::{Digest, DigestSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::CacheBridge;
use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::metadata::ItemMetadata;

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    version: u32,
    entries: Vec<CacheEntry>,
}

#[derive(Debug)]
pub struct DirCache {
    root:    PathBuf,
    entries: Mutex<Vec<CacheEntry>>,
}

impl DirCache {
    /// Open the cache rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io { path: root.clone(), source })?;

        let index_path = root.join(INDEX_FILE);
        let entries = match fs::read(&index_path) {
            Ok(bytes) => serde_json::from_slice::<Index>(&bytes)?.entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(CacheError::Io { path: index_path, source }),
        };
        debug!(root = %root.display(), entries = entries.len(), "opened cache");

        Ok(Self { root, entries: Mutex::new(entries) })
    }

    /// Snapshot of all entries, expired ones included.
    pub fn entries(&self) -> Vec<CacheEntry> { self.lock().clone() }

    fn lock(&self) -> MutexGuard<'_, Vec<CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &[CacheEntry]) -> Result<()> {
        let index = Index { version: INDEX_VERSION, entries: entries.to_vec() };
        let json = serde_json::to_vec_pretty(&index)?;
        atomic_write(self.root.join(INDEX_FILE), &json, AtomicWriteOptions::new().sync(true))?;
        Ok(())
    }

    fn payload_present(&self, entry: &CacheEntry) -> bool {
        entry.path_in(&self.root).is_some_and(|path| path.exists())
    }

    /// Replace entries sharing a digest with `entry`, dropping their stored
    /// files unless `entry` reuses the name.
    fn upsert(&self, entries: &mut Vec<CacheEntry>, entry: CacheEntry) -> Result<CacheEntry> {
        let mut kept = Vec::with_capacity(entries.len() + 1);
        for old in entries.drain(..) {
            if !old.digests.intersects(&entry.digests) {
                kept.push(old);
                continue;
            }
            if let Some(name) = old.file_name.as_deref()
                && entry.file_name.as_deref() != Some(name)
            {
                let _ = fs::remove_file(self.root.join(name));
            }
        }
        kept.push(entry.clone());
        *entries = kept;
        self.persist(entries)?;
        Ok(entry)
    }
}

fn stored_name(digests: &DigestSet, temp: &Path) -> Result<String> {
    let digest = digests.first().ok_or(CacheError::NoDigests)?;
    let file_name = temp.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(match split_name(&file_name).1 {
        Some(ext) => format!("{}.{ext}", digest.to_hex()),
        None => digest.to_hex(),
    })
}

impl CacheBridge for DirCache {
    fn lookup(&self, digest: &Digest, revive: bool) -> Option<CacheEntry> {
        let mut entries = self.lock();
        let now = Utc::now();
        let index = entries.iter().position(|e| e.matches(digest) && self.payload_present(e))?;

        if entries[index].is_expired(now) {
            if !revive {
                return None;
            }
            entries[index].touch(now);
            debug!(%digest, "revived expired cache entry");
            if let Err(e) = self.persist(&entries) {
                warn!(%digest, error = %e, "failed to persist revived cache entry");
            }
        }
        Some(entries[index].clone())
    }

    fn move_temp_to_permanent(
        &self,
        digests: &DigestSet,
        temp: &Path,
        metadata: ItemMetadata,
        ttl: Duration,
    ) -> Result<CacheEntry> {
        let name = stored_name(digests, temp)?;
        let dest = self.root.join(&name);

        let mut entries = self.lock();
        move_file(temp, &dest)?;
        let size = fs::metadata(&dest).map_err(|source| CacheError::Io { path: dest.clone(), source })?.len();
        debug!(file = %dest.display(), size, "moved payload into cache");

        let mut metadata = metadata;
        metadata.link = None;
        self.upsert(&mut entries, CacheEntry::new(digests.clone(), Some(name), size, metadata, ttl))
    }

    fn save_link_entry(&self, digests: &DigestSet, metadata: ItemMetadata, ttl: Duration) -> Result<CacheEntry> {
        if digests.is_empty() {
            return Err(CacheError::NoDigests);
        }
        let link = metadata.link.clone().ok_or(CacheError::MissingLink)?;
        let size = fs::metadata(&link).map_err(|source| CacheError::Io { path: link.clone(), source })?.len();

        let mut entries = self.lock();
        self.upsert(&mut entries, CacheEntry::new(digests.clone(), None, size, metadata, ttl))
    }

    fn storage_dir(&self) -> &Path { &self.root }
}
