//! Digest-addressed cache of shared payloads.
//!
//! [`CacheBridge`] is the narrow interface shared items use: look a payload
//! up by digest, move a finished temp file in, or record an external file by
//! reference. [`DirCache`] implements it over a plain directory.

mod bridge;
mod dir;
mod entry;
mod error;
mod metadata;

pub use bridge::CacheBridge;
pub use dir::DirCache;
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use metadata::ItemMetadata;
