//! Shareable items for peer-to-peer file sharing.
//!
//! A [`ShareItem`] identifies a payload by its digests. Creating one from
//! local data first consults the cache, so sharing the same bytes twice
//! reuses the cached copy. Items download themselves through
//! [`fileshare_fetch::Downloader`], publish to an upload service, and build
//! the [`Reference`] that announces them to peers.

mod config;
mod context;
mod download;
mod error;
mod item;
pub mod media;
mod share;
mod thumbnail;
mod upload;

pub use config::ShareConfig;
pub use context::ShareContext;
pub use download::ItemDownload;
pub use error::{Result, ShareError};
pub use item::{ItemEvent, Origin, PublishState, ShareItem};
pub use share::{MediaShare, Reference, ReferenceKind};
pub use thumbnail::{NoThumbnails, ThumbnailRenderer};
pub use upload::{Discovery, NoUploads, UploadEvent, UploadHandle, UploadService};
