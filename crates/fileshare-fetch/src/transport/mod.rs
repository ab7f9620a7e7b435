//! The transport contract and its three adapters.
//!
//! An adapter spawns one task per attempt. The task performs the network
//! work and reports back through [`Signal`]s; the owner feeds each signal to
//! [`Transport::on_signal`], which advances the adapter's [`TransportCore`]
//! and yields the [`TransportEvent`] to act on. Buffered bytes are consumed
//! with the non-blocking [`Transport::read`].

mod bulk;
mod inline;
mod peer;

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

pub use bulk::{BulkTransport, granted_range};
pub use inline::InlineTransport;
pub use peer::{FILE_TRANSFER_QUERY, PeerTransport};

use crate::error::TransportError;
use crate::file::FileDescriptor;
use crate::net::{BoxStream, HttpClient, InlineObjects, PeerSessions};
use crate::peer::{PeerId, Presence};
use crate::range::ByteRange;
use crate::source::{Source, TransportKind};

/// Message from an adapter's task to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The source resolved the range it will deliver.
    Metadata(ByteRange),
    Data(Bytes),
    /// The source is exhausted.
    Eof,
    Error(TransportError),
}

/// What an applied [`Signal`] means to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    MetaDataChanged,
    ReadyRead,
    Disconnected,
    Failed,
}

/// Sending half handed to an adapter's task, tagged with the attempt it
/// belongs to so the owner can drop signals from discarded attempts.
#[derive(Debug, Clone)]
pub struct SignalSender {
    generation: u64,
    tx:         mpsc::UnboundedSender<(u64, Signal)>,
}

impl SignalSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, Signal)>) -> Self { Self { generation, tx } }

    pub fn generation(&self) -> u64 { self.generation }

    /// Returns false once the owner is gone.
    pub fn send(&self, signal: Signal) -> bool { self.tx.send((self.generation, signal)).is_ok() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Streaming,
    Exhausted,
    Failed,
    Aborted,
}

impl TransportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportState::Exhausted | TransportState::Failed | TransportState::Aborted)
    }
}

/// State and byte buffer shared by every adapter.
#[derive(Debug)]
pub struct TransportCore {
    state:      TransportState,
    range:      ByteRange,
    buffer:     VecDeque<Bytes>,
    buffered:   usize,
    last_error: Option<TransportError>,
    task:       Option<AbortHandle>,
}

impl Default for TransportCore {
    fn default() -> Self { Self::new() }
}

impl TransportCore {
    pub fn new() -> Self {
        Self {
            state:      TransportState::Idle,
            range:      ByteRange::FULL,
            buffer:     VecDeque::new(),
            buffered:   0,
            last_error: None,
            task:       None,
        }
    }

    pub fn state(&self) -> TransportState { self.state }

    pub fn range(&self) -> ByteRange { self.range }

    pub fn set_range(&mut self, range: ByteRange) { self.range = range; }

    pub fn last_error(&self) -> Option<&TransportError> { self.last_error.as_ref() }

    pub fn bytes_available(&self) -> usize { self.buffered }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TransportState::Connecting | TransportState::Streaming)
    }

    pub(crate) fn begin(&mut self) { self.state = TransportState::Connecting; }

    /// Run `task` for this attempt; it is cancelled on [`release`](Self::release).
    ///
    /// A task that panics is reported through `signals` as a failure, so the
    /// owner never waits on an attempt that can no longer signal.
    pub(crate) fn spawn<F>(&mut self, signals: SignalSender, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.task = Some(handle.abort_handle());
        tokio::spawn(async move {
            if let Err(e) = handle.await
                && e.is_panic()
            {
                tracing::warn!(generation = signals.generation(), "transport task panicked");
                signals.send(Signal::Error(TransportError::status("transport task panicked")));
            }
        });
    }

    /// Buffer bytes without announcing them.
    pub(crate) fn stash(&mut self, bytes: Bytes) {
        if !bytes.is_empty() {
            self.buffered += bytes.len();
            self.buffer.push_back(bytes);
        }
    }

    /// Advance the state machine. Signals that are out of order for the
    /// current state are ignored.
    pub fn apply(&mut self, signal: Signal) -> Option<TransportEvent> {
        match (self.state, signal) {
            (TransportState::Connecting, Signal::Metadata(range)) => {
                self.range = range;
                self.state = TransportState::Streaming;
                Some(TransportEvent::MetaDataChanged)
            }
            (TransportState::Streaming, Signal::Data(bytes)) => {
                if bytes.is_empty() {
                    return None;
                }
                self.stash(bytes);
                Some(TransportEvent::ReadyRead)
            }
            (TransportState::Streaming, Signal::Eof) => {
                self.state = TransportState::Exhausted;
                self.task = None;
                Some(TransportEvent::Disconnected)
            }
            (TransportState::Connecting, Signal::Eof) => {
                self.fail(TransportError::protocol("source closed before announcing its range"));
                Some(TransportEvent::Failed)
            }
            (TransportState::Connecting | TransportState::Streaming, Signal::Error(error)) => {
                self.fail(error);
                Some(TransportEvent::Failed)
            }
            (state, signal) => {
                tracing::trace!(?state, ?signal, "ignoring out-of-order transport signal");
                None
            }
        }
    }

    /// Copy up to `buf.len()` buffered bytes into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < buf.len() {
            let Some(front) = self.buffer.front_mut() else { break };
            let n = front.len().min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&front[..n]);
            front.advance(n);
            copied += n;
            if front.is_empty() {
                self.buffer.pop_front();
            }
        }
        self.buffered -= copied;
        copied
    }

    fn fail(&mut self, error: TransportError) {
        self.last_error = Some(error);
        self.state = TransportState::Failed;
        self.task = None;
    }

    /// Cancel the running task and drop buffered bytes. Idempotent.
    pub(crate) fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.buffer.clear();
        self.buffered = 0;
        if !self.state.is_terminal() {
            self.state = TransportState::Aborted;
        }
    }
}

/// One way of fetching bytes from one source.
///
/// Adapters expose their [`TransportCore`]; the remaining methods have
/// defaults built on it.
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    fn core(&self) -> &TransportCore;

    fn core_mut(&mut self) -> &mut TransportCore;

    /// Begin acquisition. Failures are reported as [`Signal::Error`] through
    /// `signals`, never returned. Must be called within a tokio runtime.
    fn start(&mut self, signals: SignalSender);

    /// Release all resources. When `failure` is set the remote side is told
    /// the transfer failed, otherwise that it was declined.
    fn abort(&mut self, failure: bool, reason: &str);

    fn on_signal(&mut self, signal: Signal) -> Option<TransportEvent> { self.core_mut().apply(signal) }

    fn bytes_available(&self) -> usize { self.core().bytes_available() }

    fn read(&mut self, buf: &mut [u8]) -> usize { self.core_mut().read(buf) }

    /// True while more bytes may still arrive.
    fn is_connected(&self) -> bool { self.core().is_active() }

    fn range(&self) -> ByteRange { self.core().range() }

    /// Request `range`. Only meaningful before [`start`](Self::start).
    fn set_range(&mut self, range: ByteRange) { self.core_mut().set_range(range) }

    fn last_error(&self) -> Option<&TransportError> { self.core().last_error() }
}

/// Forward a byte stream as data signals, then end of stream.
pub(crate) async fn pump(mut body: BoxStream<'static, Result<Bytes, TransportError>>, signals: &SignalSender) {
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) if bytes.is_empty() => continue,
            Ok(bytes) => {
                if !signals.send(Signal::Data(bytes)) {
                    return;
                }
            }
            Err(error) => {
                signals.send(Signal::Error(error));
                return;
            }
        }
    }
    signals.send(Signal::Eof);
}

/// The services transports are built on.
#[derive(Clone)]
pub struct Transports {
    pub http:     Arc<dyn HttpClient>,
    pub sessions: Arc<dyn PeerSessions>,
    pub objects:  Arc<dyn InlineObjects>,
    pub presence: Arc<dyn Presence>,
}

impl Transports {
    /// Build the adapter for `source`, or `None` for unknown kinds.
    pub fn open(&self, source: &Source, file: &FileDescriptor, peers: &[PeerId]) -> Option<Box<dyn Transport>> {
        let transport: Box<dyn Transport> = match source.kind.transport()? {
            TransportKind::Bulk => Box::new(BulkTransport::new(source.uri.clone(), self.http.clone())),
            TransportKind::Peer => Box::new(PeerTransport::new(
                source.uri.clone(),
                file.clone(),
                peers.to_vec(),
                self.sessions.clone(),
                self.presence.clone(),
            )),
            TransportKind::Inline => Box::new(InlineTransport::new(
                source.uri.clone(),
                peers.to_vec(),
                self.objects.clone(),
                self.presence.clone(),
            )),
        };
        Some(transport)
    }
}
