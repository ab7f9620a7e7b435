//! Multi-source download orchestration.
//!
//! A [`Downloader`] tries the ranked sources of one payload one at a time.
//! Before any source has announced its range, a recoverable failure moves on
//! to the next source. Once a range was announced the consumer may already
//! hold bytes from it, so any later failure ends the download.
//!
//! Bytes pass through [`Downloader::read`], which copies them into a staging
//! file next to the destination. When the active source is exhausted and
//! drained, the staging file is renamed onto the destination.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileshare_fs::{clean_file_name, move_file, staging_path, unique_path};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, ErrorKind, Result, TransportError};
use crate::file::FileDescriptor;
use crate::peer::PeerId;
use crate::range::ByteRange;
use crate::source::{RankedSources, Source};
use crate::transport::{Signal, SignalSender, Transport, TransportEvent, Transports};

/// What to download and from where.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    /// Descriptor of the payload; its digests name the download when the
    /// descriptor has no usable file name.
    pub file:    FileDescriptor,
    /// Candidate peers for peer and inline sources.
    pub peers:   Vec<PeerId>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    TryingSource,
    MetaPending,
    Streaming,
    Succeeded,
    Failed,
}

impl DownloadPhase {
    pub fn is_terminal(&self) -> bool { matches!(self, DownloadPhase::Succeeded | DownloadPhase::Failed) }
}

#[derive(Debug)]
pub enum DownloadEvent {
    /// The effective range is known and staging has begun.
    MetaDataReady,
    ReadyRead,
    /// The active source delivered everything it will deliver.
    Disconnected,
    /// Yielded exactly once, carrying the destination path on success.
    Finished(Result<PathBuf>),
}

struct Staging {
    path: PathBuf,
    file: File,
}

pub struct Downloader {
    transports:  Arc<Transports>,
    config:      DownloadConfig,
    file:        FileDescriptor,
    peers:       Vec<PeerId>,
    sources:     RankedSources,
    range:       ByteRange,
    phase:       DownloadPhase,
    destination: Option<PathBuf>,
    staging:     Option<Staging>,
    transport:   Option<Box<dyn Transport>>,
    generation:  u64,
    signal_tx:   mpsc::UnboundedSender<(u64, Signal)>,
    signal_rx:   mpsc::UnboundedReceiver<(u64, Signal)>,
    meta_ready:  bool,
    last_error:  Option<DownloadError>,
    pending:     VecDeque<DownloadEvent>,
    staged:      u64,
}

impl Downloader {
    pub fn new(transports: Arc<Transports>, config: DownloadConfig, request: DownloadRequest) -> Self {
        let sources = config.priority.rank_sources(request.sources);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            transports,
            config,
            file: request.file,
            peers: request.peers,
            sources,
            range: ByteRange::FULL,
            phase: DownloadPhase::Idle,
            destination: None,
            staging: None,
            transport: None,
            generation: 0,
            signal_tx,
            signal_rx,
            meta_ready: false,
            last_error: None,
            pending: VecDeque::new(),
            staged: 0,
        }
    }

    /// Request a byte range. Takes effect for attempts started afterwards.
    pub fn set_range(&mut self, range: ByteRange) { self.range = range; }

    /// The effective range; meaningful once metadata was reported.
    pub fn range(&self) -> ByteRange { self.range }

    pub fn is_ranged(&self) -> bool { self.range.is_ranged() }

    pub fn phase(&self) -> DownloadPhase { self.phase }

    pub fn is_success(&self) -> bool { self.phase == DownloadPhase::Succeeded }

    pub fn file(&self) -> &FileDescriptor { &self.file }

    /// The finished file. Only set after success.
    pub fn file_name(&self) -> Option<&Path> {
        self.is_success().then_some(self.destination.as_deref()).flatten()
    }

    /// Where the download will be placed once it succeeds.
    pub fn destination(&self) -> Option<&Path> { self.destination.as_deref() }

    pub fn last_error(&self) -> Option<&DownloadError> { self.last_error.as_ref() }

    /// Bytes written to the staging file so far.
    pub fn staged_bytes(&self) -> u64 { self.staged }

    pub fn remaining_sources(&self) -> &RankedSources { &self.sources }

    pub fn bytes_available(&self) -> usize { self.transport.as_ref().map_or(0, |t| t.bytes_available()) }

    pub fn is_connected(&self) -> bool { self.transport.as_ref().is_some_and(|t| t.is_connected()) }

    /// Pick the destination and start the first attempt.
    ///
    /// Must be called within a tokio runtime.
    pub fn open(&mut self) -> Result<()> {
        if self.phase != DownloadPhase::Idle {
            return Err(DownloadError::AlreadyOpen);
        }
        if self.sources.is_empty() {
            self.phase = DownloadPhase::Failed;
            return Err(DownloadError::NoSources);
        }

        let dir = &self.config.documents_dir;
        fs::create_dir_all(dir).map_err(|e| DownloadError::staging(dir, &e))?;
        let destination = unique_path(dir, &self.destination_name());
        debug!(destination = %destination.display(), sources = self.sources.len(), "opening download");
        self.destination = Some(destination);

        self.start_next();
        Ok(())
    }

    fn destination_name(&self) -> String {
        let name = clean_file_name(&self.file.name);
        if !name.is_empty() {
            return name;
        }
        self.file
            .digests
            .first()
            .map(|digest| digest.to_hex())
            .unwrap_or_else(|| "download".to_string())
    }

    fn start_next(&mut self) {
        if let Some(mut previous) = self.transport.take() {
            previous.abort(false, "");
        }

        loop {
            self.phase = DownloadPhase::TryingSource;
            let Some(source) = self.sources.pop() else {
                let error = self.last_error.take().unwrap_or_else(|| {
                    TransportError::new(ErrorKind::NoSourcesRemaining, "download sources are not given").into()
                });
                self.fail(error);
                return;
            };

            let Some(mut transport) = self.transports.open(&source, &self.file, &self.peers) else {
                self.record(&source, TransportError::protocol(format!("unhandled source: {}", source.uri)));
                continue;
            };

            self.generation += 1;
            transport.set_range(self.range);
            info!(source = %source.uri, kind = ?source.kind, "trying download source");
            transport.start(SignalSender::new(self.generation, self.signal_tx.clone()));
            self.transport = Some(transport);
            self.phase = DownloadPhase::MetaPending;
            return;
        }
    }

    fn record(&mut self, source: &Source, error: TransportError) {
        debug!(source = %source.uri, %error, "download source failed");
        self.last_error = Some(error.into());
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once [`DownloadEvent::Finished`] was yielded, or before
    /// [`open`](Self::open).
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.phase.is_terminal() || self.transport.is_none() {
                return None;
            }
            let (generation, signal) = self.signal_rx.recv().await?;
            if generation == self.generation {
                self.handle_signal(signal);
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        let Some(transport) = self.transport.as_mut() else { return };
        let Some(event) = transport.on_signal(signal) else { return };

        match event {
            TransportEvent::MetaDataChanged => self.on_metadata(),
            TransportEvent::ReadyRead => self.pending.push_back(DownloadEvent::ReadyRead),
            TransportEvent::Disconnected => {
                self.pending.push_back(DownloadEvent::Disconnected);
                if transport.bytes_available() == 0 {
                    self.complete();
                }
            }
            TransportEvent::Failed => self.on_failed(),
        }
    }

    fn on_metadata(&mut self) {
        let Some(destination) = self.destination.as_deref() else { return };
        let path = staging_path(destination, &self.config.staging_prefix);

        let opened = OpenOptions::new().write(true).create(true).truncate(true).open(&path);
        let file = match opened {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open staging file");
                self.fail(DownloadError::staging(&path, &e));
                return;
            }
        };
        self.staging = Some(Staging { path, file });
        self.meta_ready = true;

        if let Some(transport) = self.transport.as_ref() {
            self.range = transport.range();
        }
        debug!(range = ?self.range, "source metadata ready");
        self.phase = DownloadPhase::Streaming;
        self.pending.push_back(DownloadEvent::MetaDataReady);
    }

    fn on_failed(&mut self) {
        let error = self
            .transport
            .as_ref()
            .and_then(|t| t.last_error().cloned())
            .unwrap_or_else(|| TransportError::status("transport failed"));

        if self.meta_ready || !error.kind.is_recoverable() {
            self.fail(error.into());
            return;
        }
        warn!(%error, remaining = self.sources.len(), "download source failed, falling back");
        self.last_error = Some(error.into());
        self.start_next();
    }

    /// Read buffered bytes, copying them into the staging file.
    ///
    /// Never blocks. Returns `Ok(0)` when nothing is buffered. A staging
    /// write failure aborts the download and is returned here as well as
    /// through [`DownloadEvent::Finished`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.phase.is_terminal() {
            return Ok(0);
        }
        let (Some(transport), Some(staging)) = (self.transport.as_mut(), self.staging.as_mut()) else {
            return Ok(0);
        };

        let n = transport.read(buf);
        if let Err(e) = staging.file.write_all(&buf[..n]) {
            let error = DownloadError::staging(&staging.path, &e);
            self.fail(error.clone());
            return Err(error);
        }
        self.staged += n as u64;

        if !transport.is_connected() && transport.bytes_available() == 0 {
            self.complete();
        }
        Ok(n)
    }

    /// Pump events and reads until the download finishes, passing every
    /// chunk to `sink`. Opens the download first if needed.
    pub async fn drive<F>(&mut self, mut sink: F) -> Result<PathBuf>
    where
        F: FnMut(&[u8]),
    {
        if self.phase == DownloadPhase::Idle {
            self.open()?;
        }

        let mut buf = vec![0u8; self.config.read_chunk.max(1)];
        while let Some(event) = self.next_event().await {
            match event {
                DownloadEvent::Finished(result) => return result,
                DownloadEvent::MetaDataReady | DownloadEvent::ReadyRead | DownloadEvent::Disconnected => loop {
                    let n = self.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    sink(&buf[..n]);
                },
            }
        }

        Err(self
            .last_error
            .clone()
            .unwrap_or_else(|| TransportError::status("download ended without a result").into()))
    }

    fn complete(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        let (Some(staging), Some(destination)) = (self.staging.take(), self.destination.clone()) else {
            self.fail(TransportError::protocol("source finished before announcing its range").into());
            return;
        };

        let Staging { path, mut file } = staging;
        if let Err(e) = file.flush().and_then(|()| file.sync_all()) {
            self.staging = Some(Staging { path: path.clone(), file });
            self.fail(DownloadError::staging(&path, &e));
            return;
        }
        drop(file);
        if let Err(e) = move_file(&path, &destination) {
            let _ = fs::remove_file(&path);
            self.fail(DownloadError::Staging { path, message: e.to_string() });
            return;
        }

        if let Some(mut transport) = self.transport.take() {
            transport.abort(false, "");
        }
        self.phase = DownloadPhase::Succeeded;
        self.last_error = None;
        info!(destination = %destination.display(), bytes = self.staged, "download finished");
        self.pending.push_back(DownloadEvent::Finished(Ok(destination)));
    }

    fn fail(&mut self, error: DownloadError) {
        if self.phase.is_terminal() {
            return;
        }
        if let Some(mut transport) = self.transport.take() {
            transport.abort(true, &error.to_string());
        }
        if let Some(staging) = self.staging.take() {
            drop(staging.file);
            let _ = fs::remove_file(&staging.path);
        }

        warn!(%error, "download failed");
        self.phase = DownloadPhase::Failed;
        self.last_error = Some(error.clone());
        self.pending.push_back(DownloadEvent::Finished(Err(error)));
    }

    /// Stop the download. Idempotent and safe in any phase; a running
    /// download finishes with an error.
    pub fn abort(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.abort(false, "");
        }
        if self.phase != DownloadPhase::Idle {
            self.fail(TransportError::status("download aborted").into());
        }
    }
}

impl Drop for Downloader {
    fn drop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.abort(false, "");
        }
        if let Some(staging) = self.staging.take() {
            drop(staging.file);
            let _ = fs::remove_file(&staging.path);
        }
    }
}
