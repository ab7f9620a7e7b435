use std::path::Path;
use std::time::Duration;

use fileshare_verify::{Digest, DigestSet};

use crate::entry::CacheEntry;
use crate::error::Result;
use crate::metadata::ItemMetadata;

/// Digest-addressed cache as seen by shared items.
///
/// Implementations must be safe to call from several items at once. For
/// payloads with identical digests the last writer wins, and a lookup sees
/// either the previous entry or the fully moved-in one.
pub trait CacheBridge: Send + Sync {
    /// Entry holding `digest`. An expired entry is returned only when
    /// `revive` is set, and then gets a fresh lifetime.
    fn lookup(&self, digest: &Digest, revive: bool) -> Option<CacheEntry>;

    /// Move the file at `temp` into the cache as a new permanent entry.
    fn move_temp_to_permanent(
        &self,
        digests: &DigestSet,
        temp: &Path,
        metadata: ItemMetadata,
        ttl: Duration,
    ) -> Result<CacheEntry>;

    /// Record a payload that stays at `metadata.link` instead of being copied.
    fn save_link_entry(&self, digests: &DigestSet, metadata: ItemMetadata, ttl: Duration) -> Result<CacheEntry>;

    /// Directory stored payload files live in.
    fn storage_dir(&self) -> &Path;
}
