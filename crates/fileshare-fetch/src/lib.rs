//! Resumable multi-source downloads.
//!
//! A payload may be available from several places at once: a web server, a
//! chat peer willing to send it directly, or a peer's small-object store.
//! [`Downloader`] ranks those [sources](source), tries them one at a time
//! through a matching [`Transport`](transport::Transport), and stages the
//! bytes it hands to the consumer in a file next to the destination.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fileshare_fetch::{DownloadConfig, DownloadRequest, Downloader, FileDescriptor, Transports};
//!
//! # async fn example(transports: Arc<Transports>) -> fileshare_fetch::Result<()> {
//! let request = DownloadRequest {
//!     file: FileDescriptor { name: "photo.png".into(), ..Default::default() },
//!     peers: vec![],
//!     sources: vec!["https://example.org/photo.png".into()],
//! };
//! let mut download = Downloader::new(transports, DownloadConfig::new("/tmp/downloads"), request);
//! let path = download.drive(|_chunk| {}).await?;
//! println!("saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod downloader;
pub mod error;
pub mod file;
pub mod net;
pub mod peer;
pub mod range;
pub mod source;
pub mod transport;

pub use config::DownloadConfig;
pub use downloader::{DownloadEvent, DownloadPhase, DownloadRequest, Downloader};
pub use error::{DownloadError, ErrorKind, Result, TransportError};
pub use file::{FileDescriptor, Thumbnail};
pub use peer::{PeerId, Presence, select_reachable};
pub use range::ByteRange;
pub use source::{RankedSources, Source, SourceKind, SourcePriority, TransportKind};
pub use transport::{Transport, TransportEvent, Transports};
