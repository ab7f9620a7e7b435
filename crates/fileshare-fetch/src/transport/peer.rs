use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use super::{Signal, SignalSender, Transport, TransportCore};
use crate::error::TransportError;
use crate::file::FileDescriptor;
use crate::net::{BoxStream, FileOffer, PeerSession, PeerSessions, Role, SessionControl, SessionEvent, Termination};
use crate::peer::{PeerId, Presence, select_reachable};
use crate::source::TransportKind;

/// Query key marking a peer URI as a file-transfer request.
pub const FILE_TRANSFER_QUERY: &str = "jingle-ft";

type Connection = BoxStream<'static, Result<Bytes, TransportError>>;

/// Session-negotiated transfer from a chat peer.
pub struct PeerTransport {
    core:     TransportCore,
    uri:      String,
    file:     FileDescriptor,
    peers:    Vec<PeerId>,
    sessions: Arc<dyn PeerSessions>,
    presence: Arc<dyn Presence>,
    control:  Option<Arc<dyn SessionControl>>,
}

impl PeerTransport {
    pub fn new(
        uri: impl Into<String>,
        file: FileDescriptor,
        peers: Vec<PeerId>,
        sessions: Arc<dyn PeerSessions>,
        presence: Arc<dyn Presence>,
    ) -> Self {
        Self {
            core: TransportCore::new(),
            uri: uri.into(),
            file,
            peers,
            sessions,
            presence,
            control: None,
        }
    }

    fn initiate(&self) -> Result<PeerSession, TransportError> {
        let invalid = || TransportError::protocol("invalid peer-transfer URI");
        let url = Url::parse(&self.uri).map_err(|_| invalid())?;

        let mut candidates = self.peers.clone();
        let named = url.path().trim_start_matches('/');
        if let Ok(peer) = named.parse::<PeerId>()
            && peer.node().is_some()
        {
            candidates.insert(0, peer);
        }
        let peer = select_reachable(self.presence.as_ref(), &candidates)
            .ok_or_else(|| TransportError::unreachable("peer-transfer data source is offline"))?;

        let key = url
            .query()
            .and_then(|query| query.split(';').next())
            .map(|item| item.split_once('=').map_or(item, |(key, _)| key))
            .unwrap_or_default();
        if key != FILE_TRANSFER_QUERY {
            return Err(invalid());
        }

        debug!(uri = %self.uri, %peer, range = ?self.core.range(), "initiating peer transfer");
        let offer = FileOffer {
            file:      self.file.with_range(self.core.range()),
            role:      Role::Responder,
            streaming: true,
        };
        self.sessions.initiate(&peer, offer).map_err(TransportError::unreachable)
    }
}

async fn next_chunk(connection: &mut Option<Connection>) -> Option<Result<Bytes, TransportError>> {
    match connection {
        Some(connection) => connection.next().await,
        None => std::future::pending().await,
    }
}

async fn run_session(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    control: Arc<dyn SessionControl>,
    signals: SignalSender,
) {
    let mut connection: Option<Connection> = None;
    let mut declined: Option<TransportError> = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::ConnectionReady { granted, connection: stream }) => {
                    connection = Some(stream);
                    signals.send(Signal::Metadata(granted));
                }
                Some(SessionEvent::ContentProposed) => {
                    let error = TransportError::protocol("unexpected incoming content");
                    warn!("peer proposed content on a download session, declining");
                    control.terminate(Termination::Decline, &error.message);
                    declined.get_or_insert(error);
                }
                Some(SessionEvent::Finished(Termination::Success)) if declined.is_none() => {
                    match connection.take() {
                        Some(rest) => super::pump(rest, &signals).await,
                        None => {
                            signals.send(Signal::Eof);
                        }
                    }
                    return;
                }
                Some(SessionEvent::Finished(reason)) => {
                    let error = declined
                        .take()
                        .unwrap_or_else(|| TransportError::status(format!("peer transfer ended: {reason}")));
                    signals.send(Signal::Error(error));
                    return;
                }
                None => {
                    signals.send(Signal::Error(TransportError::status("peer session closed")));
                    return;
                }
            },
            chunk = next_chunk(&mut connection) => match chunk {
                Some(Ok(bytes)) => {
                    if !bytes.is_empty() && !signals.send(Signal::Data(bytes)) {
                        return;
                    }
                }
                Some(Err(error)) => {
                    signals.send(Signal::Error(error));
                    return;
                }
                // end of the byte stream; the session reports how it ended
                None => connection = None,
            },
        }
    }
}

impl Transport for PeerTransport {
    fn kind(&self) -> TransportKind { TransportKind::Peer }

    fn core(&self) -> &TransportCore { &self.core }

    fn core_mut(&mut self) -> &mut TransportCore { &mut self.core }

    fn start(&mut self, signals: SignalSender) {
        self.core.begin();
        match self.initiate() {
            Ok(session) => {
                self.control = Some(session.control.clone());
                self.core.spawn(signals.clone(), run_session(session.events, session.control, signals));
            }
            Err(error) => {
                signals.send(Signal::Error(error));
            }
        }
    }

    fn abort(&mut self, failure: bool, reason: &str) {
        if let Some(control) = self.control.take()
            && self.core.is_active()
        {
            let termination = if failure { Termination::FailedApplication } else { Termination::Decline };
            control.terminate(termination, reason);
        }
        self.core.release();
    }
}
