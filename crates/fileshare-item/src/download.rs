use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use fileshare_fetch::{DownloadError, DownloadEvent, Downloader};
use fileshare_store::{CacheBridge, CacheEntry, ItemMetadata};
use fileshare_verify::{DigestSet, verify_reader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, ShareError};
use crate::item::ItemEvent;

/// Marks an item's whole-file download as in flight while alive.
#[derive(Debug)]
pub(crate) struct DownloadSlot;

/// What a tracked download does once its payload is on disk.
pub(crate) struct Completion {
    pub(crate) _slot:    Arc<DownloadSlot>,
    pub(crate) cache:    Arc<dyn CacheBridge>,
    pub(crate) digests:  DigestSet,
    pub(crate) metadata: ItemMetadata,
    pub(crate) modified: Option<DateTime<Utc>>,
    pub(crate) ttl:      Duration,
    pub(crate) events:   Option<mpsc::UnboundedSender<ItemEvent>>,
}

impl Completion {
    /// Check the staged payload against the item's digests.
    ///
    /// Payloads with no locally computable digest are accepted as they are.
    fn verify(&self, path: &Path) -> Result<()> {
        let Some(expected) = self.digests.iter().find(|d| d.algorithm.is_computable()) else {
            debug!(path = %path.display(), "no computable digest, caching unverified");
            return Ok(());
        };
        let file = File::open(path).map_err(ShareError::io(path))?;
        let checked = verify_reader(BufReader::new(file), expected)?;
        debug!(algorithm = %expected.algorithm, bytes = checked, "download verified");
        Ok(())
    }

    fn store(&self, path: &Path) -> Result<(CacheEntry, PathBuf)> {
        if let Err(e) = self.verify(path) {
            warn!(path = %path.display(), error = %e, "discarding download that fails verification");
            let _ = fs::remove_file(path);
            return Err(e);
        }
        if let Some(modified) = self.modified
            && let Err(e) = fileshare_fs::set_modified(path, SystemTime::from(modified))
        {
            warn!(path = %path.display(), error = %e, "cannot apply modification time");
        }

        let entry = self.cache.move_temp_to_permanent(&self.digests, path, self.metadata.clone(), self.ttl)?;
        let cached = entry.path_in(self.cache.storage_dir()).unwrap_or_else(|| path.to_path_buf());
        debug!(path = %cached.display(), "download moved into cache");
        Ok((entry, cached))
    }

    fn notify(&self, success: bool) {
        if let Some(events) = &self.events {
            let _ = events.send(ItemEvent::DownloadFinished { success });
        }
    }
}

/// A download started from a [`ShareItem`](crate::ShareItem).
///
/// The item's single whole-file download is *tracked*: on success the file
/// gets the item's modification time and is moved into the cache. Ranged
/// and duplicate downloads are untracked and leave the file where the
/// downloader put it.
pub struct ItemDownload {
    downloader: Downloader,
    completion: Option<Completion>,
    tracked:    bool,
    entry:      Option<CacheEntry>,
}

impl ItemDownload {
    pub(crate) fn untracked(downloader: Downloader) -> Self {
        Self { downloader, completion: None, tracked: false, entry: None }
    }

    pub(crate) fn tracked(downloader: Downloader, completion: Completion) -> Self {
        Self { downloader, completion: Some(completion), tracked: true, entry: None }
    }

    /// Whether this download updates the item's cache entry on success.
    pub fn is_tracked(&self) -> bool { self.tracked }

    pub fn downloader(&self) -> &Downloader { &self.downloader }

    pub fn downloader_mut(&mut self) -> &mut Downloader { &mut self.downloader }

    /// The cache entry written after a tracked download succeeded.
    pub fn cache_entry(&self) -> Option<&CacheEntry> { self.entry.as_ref() }

    pub fn into_cache_entry(self) -> Option<CacheEntry> { self.entry }

    pub fn open(&mut self) -> std::result::Result<(), DownloadError> {
        let opened = self.downloader.open();
        if opened.is_err() {
            let _ = self.settle(None);
        }
        opened
    }

    /// Wait for the next notification.
    ///
    /// For a tracked download, [`DownloadEvent::Finished`] carries the cache
    /// location, or an error when the payload could not be verified or
    /// cached.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        let event = self.downloader.next_event().await?;
        let DownloadEvent::Finished(result) = event else { return Some(event) };

        let result = match result {
            Ok(path) => match self.settle(Some(&path)) {
                Ok(cached) => Ok(cached.unwrap_or(path)),
                Err(e) => {
                    warn!(error = %e, "cannot cache finished download");
                    Err(DownloadError::Staging { path, message: e.to_string() })
                }
            },
            Err(e) => {
                let _ = self.settle(None);
                Err(e)
            }
        };
        Some(DownloadEvent::Finished(result))
    }

    pub fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DownloadError> { self.downloader.read(buf) }

    pub fn abort(&mut self) { self.downloader.abort(); }

    /// Run the download to completion, passing chunks to `sink`.
    ///
    /// Returns where the payload ended up: its cache location for a tracked
    /// download, the downloaded file otherwise.
    pub async fn drive<F>(&mut self, sink: F) -> Result<PathBuf>
    where
        F: FnMut(&[u8]),
    {
        match self.downloader.drive(sink).await {
            Ok(path) => Ok(self.settle(Some(&path))?.unwrap_or(path)),
            Err(e) => {
                let _ = self.settle(None);
                Err(e.into())
            }
        }
    }

    fn settle(&mut self, finished: Option<&Path>) -> Result<Option<PathBuf>> {
        let Some(completion) = self.completion.take() else { return Ok(None) };

        let stored = finished.map(|path| completion.store(path)).transpose();
        completion.notify(matches!(stored, Ok(Some(_))));
        let (entry, path) = match stored? {
            Some(stored) => stored,
            None => return Ok(None),
        };
        self.entry = Some(entry);
        Ok(Some(path))
    }
}
