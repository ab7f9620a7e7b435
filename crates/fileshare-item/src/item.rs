//! The shareable item.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use fileshare_fetch::transport::FILE_TRANSFER_QUERY;
use fileshare_fetch::{
    ByteRange, DownloadRequest, Downloader, FileDescriptor, PeerId, SourceKind, Thumbnail,
};
use fileshare_fs::{clean_file_name, persist_temp};
use fileshare_store::{CacheEntry, ItemMetadata};
use fileshare_verify::{Digest, DigestSet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::ShareContext;
use crate::download::{Completion, DownloadSlot, ItemDownload};
use crate::error::{Result, ShareError};
use crate::media;
use crate::share::{MediaShare, Reference, ReferenceKind};
use crate::upload::{Discovery, UploadEvent};

const TEMP_PREFIX: &str = "share-";
const PNG: &str = "image/png";

/// Where an item's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Stored in the cache directory.
    LocalFile,
    /// A user file referenced in place.
    LocalLink,
    /// A file this item wrote and removes when dropped.
    TempFile,
    /// Known only from a peer's announcement.
    RemoteFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    PublishProgress(u64),
    LogChanged,
    Published,
    DownloadFinished { success: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishState {
    pub bulk_done: bool,
    pub peer_done: bool,
    /// "Published" was announced; set at most once.
    pub announced: bool,
}

impl PublishState {
    fn is_complete(&self) -> bool { self.bulk_done && self.peer_done }
}

/// A payload identified by its digests.
pub struct ShareItem {
    ctx:         Arc<ShareContext>,
    origin:      Origin,
    digests:     DigestSet,
    path:        Option<PathBuf>,
    name:        String,
    media_type:  String,
    size:        Option<u64>,
    modified:    Option<DateTime<Utc>>,
    description: String,
    metadata:    ItemMetadata,
    sources:     Vec<String>,
    peers:       Vec<PeerId>,
    state:       PublishState,
    log:         Vec<String>,
    download:    Weak<DownloadSlot>,
    events:      Option<mpsc::UnboundedSender<ItemEvent>>,
}

impl std::fmt::Debug for ShareItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareItem")
            .field("origin", &self.origin)
            .field("digests", &self.digests)
            .field("path", &self.path)
            .field("media_type", &self.media_type)
            .field("size", &self.size)
            .field("sources", &self.sources)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ShareItem {
    fn blank(ctx: Arc<ShareContext>, origin: Origin, digests: DigestSet) -> Self {
        Self {
            ctx,
            origin,
            digests,
            path: None,
            name: String::new(),
            media_type: String::new(),
            size: None,
            modified: None,
            description: String::new(),
            metadata: ItemMetadata::default(),
            sources: Vec::new(),
            peers: Vec::new(),
            state: PublishState::default(),
            log: Vec::new(),
            download: Weak::new(),
            events: None,
        }
    }

    /// Item for an existing cache entry.
    pub fn from_cache(ctx: Arc<ShareContext>, entry: CacheEntry) -> Self {
        let mut item = Self::blank(ctx, Origin::LocalFile, DigestSet::new());
        item.init_from_entry(entry);
        item
    }

    /// Item for a payload announced by `from`.
    ///
    /// If the payload is cached already the item is local and the
    /// announcement only contributes `from` as a candidate peer.
    pub fn from_share(ctx: Arc<ShareContext>, share: &MediaShare, from: PeerId) -> Self {
        let mut item = Self::blank(ctx, Origin::RemoteFile, share.file.digests.clone());
        item.peers.push(from);
        if item.try_cache() {
            return item;
        }

        let file = &share.file;
        item.name = file.name.clone();
        item.media_type = file.media_type.clone();
        item.size = file.size;
        item.modified = file.date;
        item.description = file.description.clone();
        item.sources = share.sources.clone();
        item.metadata.amplitudes = file.amplitudes.clone().filter(|a| !a.is_empty());
        if let Some(thumbnail) = &file.thumbnail {
            item.metadata.thumb_uri = Some(thumbnail.uri.clone());
            item.metadata.thumb_media_type = Some(thumbnail.media_type.clone());
        }
        item
    }

    /// Item for a captured image, already PNG-encoded.
    pub fn from_png(ctx: Arc<ShareContext>, png: &[u8]) -> Result<Self> {
        let mut item = Self::blank(ctx, Origin::TempFile, Digest::of_bytes(png).into());
        if item.try_cache() {
            return Ok(item);
        }

        let path = persist_temp(&item.ctx.config.temp_dir, TEMP_PREFIX, ".png", png)?;
        debug!(path = %path.display(), "materialized image");
        item.path = Some(path);
        item.media_type = PNG.to_string();
        item.size = Some(png.len() as u64);
        item.modified = Some(Utc::now());
        Ok(item)
    }

    /// Item for a user file, shared by reference.
    pub fn from_local_file(ctx: Arc<ShareContext>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(ShareError::io(&path))?;
        let digest = Digest::of_reader(file)?;

        let mut item = Self::blank(ctx, Origin::LocalLink, digest.into());
        if item.try_cache() {
            return Ok(item);
        }

        let meta = fs::metadata(&path).map_err(ShareError::io(&path))?;
        let mut head = Vec::new();
        File::open(&path)
            .and_then(|f| f.take(media::SNIFF_LEN).read_to_end(&mut head))
            .map_err(ShareError::io(&path))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());

        item.media_type = media::sniff(&head, file_name.as_deref());
        item.size = Some(meta.len());
        item.modified = meta.modified().ok().map(DateTime::<Utc>::from);
        item.path = Some(path);
        Ok(item)
    }

    /// Item for in-memory data, such as a recorded voice clip.
    ///
    /// `metadata` carries extras like waveform amplitudes and is kept even
    /// when the payload is found in the cache.
    pub fn from_blob(
        ctx: Arc<ShareContext>,
        media_type: &str,
        data: &[u8],
        metadata: ItemMetadata,
    ) -> Result<Self> {
        let mut item = Self::blank(ctx, Origin::TempFile, Digest::of_bytes(data).into());
        item.modified = Some(Utc::now());
        if item.try_cache() {
            item.overlay(metadata);
            return Ok(item);
        }

        let sniffed = media::sniff(data, None);
        let media_type = if media_type.is_empty() { sniffed.clone() } else { media_type.to_string() };
        let suffix = media::extension_for(&sniffed)
            .or_else(|| media::extension_for(&media_type))
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let path = persist_temp(&item.ctx.config.temp_dir, TEMP_PREFIX, &suffix, data)?;
        debug!(path = %path.display(), %media_type, "materialized blob");
        item.path = Some(path);
        item.media_type = media_type;
        item.size = Some(data.len() as u64);
        item.metadata = metadata;
        Ok(item)
    }

    fn try_cache(&mut self) -> bool {
        match self.cache(true) {
            Some(entry) => {
                debug!(digest = ?self.digests.first().map(Digest::to_hex), "item found in cache");
                self.init_from_entry(entry);
                true
            }
            None => false,
        }
    }

    fn init_from_entry(&mut self, entry: CacheEntry) {
        let storage_dir = self.ctx.cache.storage_dir().to_path_buf();
        let CacheEntry { digests, file_name, size, metadata, .. } = entry;

        self.state = PublishState { announced: true, ..PublishState::default() };
        match (&metadata.link, file_name) {
            (Some(link), _) => {
                self.origin = Origin::LocalLink;
                self.size = Some(fs::metadata(link).map(|m| m.len()).unwrap_or(size));
                self.path = Some(link.clone());
            }
            (None, file_name) => {
                self.origin = Origin::LocalFile;
                self.size = Some(size);
                self.path = file_name.map(|name| storage_dir.join(name));
            }
        }

        self.digests = digests;
        self.media_type = metadata.media_type;
        self.sources = metadata.uris;
        for uri in &self.sources {
            match SourceKind::of(uri) {
                SourceKind::Http => self.state.bulk_done = true,
                SourceKind::Peer => self.state.peer_done = true,
                _ => {}
            }
        }
        self.metadata = ItemMetadata {
            thumb_media_type: metadata.thumb_media_type,
            thumb_uri: metadata.thumb_uri,
            amplitudes: metadata.amplitudes,
            extra: metadata.extra,
            ..ItemMetadata::default()
        };
    }

    fn overlay(&mut self, metadata: ItemMetadata) {
        if metadata.amplitudes.is_some() {
            self.metadata.amplitudes = metadata.amplitudes;
        }
        if metadata.thumb_uri.is_some() {
            self.metadata.thumb_uri = metadata.thumb_uri;
            self.metadata.thumb_media_type = metadata.thumb_media_type;
        }
        self.metadata.extra.extend(metadata.extra);
    }

    /// Receive this item's notifications. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ItemEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: ItemEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    pub fn origin(&self) -> Origin { self.origin }

    pub fn digests(&self) -> &DigestSet { &self.digests }

    /// Backing file, if the item has local bytes.
    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn media_type(&self) -> &str { &self.media_type }

    pub fn size(&self) -> Option<u64> { self.size }

    pub fn modified(&self) -> Option<DateTime<Utc>> { self.modified }

    pub fn metadata(&self) -> &ItemMetadata { &self.metadata }

    pub fn sources(&self) -> &[String] { &self.sources }

    pub fn peers(&self) -> &[PeerId] { &self.peers }

    pub fn publish_state(&self) -> PublishState { self.state }

    pub fn log(&self) -> &[String] { &self.log }

    pub fn description(&self) -> &str { &self.description }

    pub fn set_description(&mut self, description: impl Into<String>) { self.description = description.into(); }

    pub fn is_downloading(&self) -> bool { self.download.strong_count() > 0 }

    /// First cache entry holding any of this item's digests.
    pub fn cache(&self, revive: bool) -> Option<CacheEntry> {
        self.digests.iter().find_map(|digest| self.ctx.cache.lookup(digest, revive))
    }

    /// Name to show and to upload under.
    pub fn display_name(&self) -> String {
        let from_path = self.path.as_deref().and_then(Path::file_name).map(|n| n.to_string_lossy().into_owned());
        if let Some(name) = from_path {
            return name;
        }
        let declared = clean_file_name(&self.name);
        if !declared.is_empty() {
            return declared;
        }

        let hex = self.digests.first().map(Digest::to_hex).unwrap_or_default();
        match media::extension_for(&self.media_type) {
            Some(ext) => format!("{TEMP_PREFIX}{hex}.{ext}"),
            None => format!("{TEMP_PREFIX}{hex}"),
        }
    }

    /// The best source if it can be handed to a media player as is.
    pub fn simple_source(&self) -> Option<String> {
        let ranked = self.ctx.config.download.priority.rank_sources(self.sources.iter().cloned());
        ranked.best().filter(|s| s.kind.is_bulk()).map(|s| s.uri.clone())
    }

    /// Start fetching the payload, whole when `range` is not ranged.
    ///
    /// A range covering exactly the known size counts as the whole file.
    /// Only one whole-file download is tracked at a time; a second one runs
    /// untracked and is logged as a duplicate.
    pub fn download(&mut self, range: ByteRange) -> ItemDownload {
        let range = match self.size {
            Some(size) if range.is_ranged() && range.covers(size) => ByteRange::FULL,
            _ => range,
        };

        let name = if self.name.is_empty() {
            self.path.as_deref().and_then(Path::file_name).map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        } else {
            self.name.clone()
        };
        let file = FileDescriptor {
            date: self.modified,
            digests: self.digests.clone(),
            name,
            size: self.size,
            media_type: self.media_type.clone(),
            ..FileDescriptor::default()
        };
        let request = DownloadRequest { file, peers: self.peers.clone(), sources: self.sources.clone() };
        let mut downloader =
            Downloader::new(self.ctx.transports.clone(), self.ctx.config.download.clone(), request);

        if range.is_ranged() {
            downloader.set_range(range);
            return ItemDownload::untracked(downloader);
        }
        if self.is_downloading() {
            warn!(name = %self.display_name(), "double download for the same file");
            return ItemDownload::untracked(downloader);
        }

        let slot = Arc::new(DownloadSlot);
        self.download = Arc::downgrade(&slot);
        let completion = Completion {
            _slot:    slot,
            cache:    self.ctx.cache.clone(),
            digests:  self.digests.clone(),
            metadata: ItemMetadata {
                media_type: self.media_type.clone(),
                uris: self.sources.clone(),
                ..self.metadata.clone()
            },
            modified: self.modified,
            ttl:      self.ctx.config.file_ttl(),
            events:   self.events.clone(),
        };
        ItemDownload::tracked(downloader, completion)
    }

    /// Take over the cache entry a finished download produced.
    pub fn adopt(&mut self, entry: CacheEntry) {
        if self.origin == Origin::TempFile {
            self.remove_temp();
        }
        self.init_from_entry(entry);
    }

    /// Make the payload fetchable by others and record it in the cache.
    ///
    /// Uploads to the upload service when one exists, then marks the peer
    /// transfer path as available. Once both are settled the item is moved
    /// into the cache (temp files) or recorded by reference (user files),
    /// and [`ItemEvent::Published`] fires. Calling this again afterwards
    /// does nothing.
    pub async fn publish(&mut self) -> Result<()> {
        if self.origin == Origin::RemoteFile {
            return Err(ShareError::RemoteItem);
        }

        if !self.state.bulk_done {
            self.publish_bulk().await?;
        }
        if !self.state.peer_done {
            // peers learn about the payload from the announcement itself
            self.state.peer_done = true;
        }
        self.finish_publish()
    }

    async fn publish_bulk(&mut self) -> Result<()> {
        if self.ctx.uploads.discovery() == Discovery::NotFound {
            self.state.bulk_done = true;
            return Ok(());
        }

        let path = self.path.clone().ok_or(ShareError::NoBackingFile)?;
        let mut upload = self.ctx.uploads.upload(&path, &self.display_name(), &self.media_type);
        let mut outcome = Err("upload ended without a result".to_string());
        while let Some(event) = upload.events.recv().await {
            match event {
                UploadEvent::Progress { sent, .. } => self.emit(ItemEvent::PublishProgress(sent)),
                UploadEvent::Finished(result) => {
                    outcome = result;
                    break;
                }
            }
        }

        self.state.bulk_done = true;
        match outcome {
            Ok(url) => {
                info!(%url, "published on upload service");
                self.log.push("Published on upload service".to_string());
                self.sources.push(url);
            }
            Err(reason) => {
                warn!(%reason, "upload failed");
                self.log.push(format!("Failed to publish on upload service: {reason}"));
            }
        }
        self.emit(ItemEvent::LogChanged);
        Ok(())
    }

    fn finish_publish(&mut self) -> Result<()> {
        if self.state.announced || !self.state.is_complete() {
            return Ok(());
        }
        let path = self.path.clone().ok_or(ShareError::NoBackingFile)?;

        let mut meta = self.metadata.clone();
        meta.media_type = self.media_type.clone();
        meta.uris = self.sources.clone();

        if self.origin == Origin::TempFile {
            let entry = self.ctx.cache.move_temp_to_permanent(&self.digests, &path, meta, self.ctx.config.temp_ttl())?;
            self.origin = Origin::LocalFile;
            self.path = entry.path_in(self.ctx.cache.storage_dir());
        } else {
            meta.link = Some(path);
            self.ctx.cache.save_link_entry(&self.digests, meta, self.ctx.config.file_ttl())?;
        }

        self.state.announced = true;
        self.emit(ItemEvent::Published);
        Ok(())
    }

    /// Build the reference announcing this item to peers.
    ///
    /// Fails when the local session has no resource to address.
    pub fn to_reference(&self) -> Result<Reference> {
        let transports = &self.ctx.transports;
        let local = transports
            .presence
            .local_identity()
            .filter(|id| id.resource().is_some())
            .ok_or(ShareError::NoIdentity)?;

        let mut uris = self.sources.clone();
        uris.push(format!("xmpp:{local}?{FILE_TRANSFER_QUERY}"));
        // worklist order is ascending; announcements list the best first
        let sources = self.ctx.config.download.priority.rank_sources(uris).into_wire_order();
        let uri = sources.first().cloned().ok_or(ShareError::NoSources)?;

        let on_disk = self.path.as_deref().and_then(|p| fs::metadata(p).ok());
        let mut file = FileDescriptor {
            date: on_disk.as_ref().and_then(|m| m.modified().ok()).map(DateTime::<Utc>::from).or(self.modified),
            digests: self.digests.clone(),
            name: self.display_name(),
            size: on_disk.as_ref().map(|m| m.len()).or(self.size),
            media_type: self.media_type.clone(),
            description: self.description.clone(),
            amplitudes: self.metadata.amplitudes.clone().filter(|a| !a.is_empty()),
            ..FileDescriptor::default()
        };
        file.thumbnail = self.publish_thumbnail();

        Ok(Reference {
            kind: ReferenceKind::Data,
            uri,
            media_share: MediaShare { file, sources },
        })
    }

    fn publish_thumbnail(&self) -> Option<Thumbnail> {
        if self.origin == Origin::RemoteFile {
            return None;
        }
        let path = self.path.as_deref()?;
        let size = self.ctx.config.thumbnail_size;
        let png = self.ctx.thumbnails.render_png(path, &self.media_type, size)?;

        let ttl = match self.origin {
            Origin::TempFile => self.ctx.config.temp_ttl(),
            _ => self.ctx.config.file_ttl(),
        };
        let id = self.ctx.transports.objects.publish(Bytes::from(png), PNG, ttl);
        Some(Thumbnail { uri: format!("cid:{id}"), media_type: PNG.to_string(), width: size, height: size })
    }

    fn remove_temp(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(e) = fs::remove_file(&path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "cannot remove temporary file");
        }
    }
}

impl Drop for ShareItem {
    fn drop(&mut self) {
        if self.origin == Origin::TempFile {
            self.remove_temp();
        }
    }
}
