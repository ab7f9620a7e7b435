use std::sync::Arc;

use tracing::debug;

use super::{Signal, SignalSender, Transport, TransportCore, TransportEvent};
use crate::error::TransportError;
use crate::net::InlineObjects;
use crate::peer::{PeerId, Presence, select_reachable};
use crate::range::ByteRange;
use crate::source::TransportKind;

/// One-shot fetch of a small object from a peer's object service.
///
/// Objects arrive whole, so ranges are not supported: whatever range was
/// requested, the effective range is the full payload.
pub struct InlineTransport {
    core:     TransportCore,
    uri:      String,
    peers:    Vec<PeerId>,
    objects:  Arc<dyn InlineObjects>,
    presence: Arc<dyn Presence>,
}

impl InlineTransport {
    pub fn new(
        uri: impl Into<String>,
        peers: Vec<PeerId>,
        objects: Arc<dyn InlineObjects>,
        presence: Arc<dyn Presence>,
    ) -> Self {
        Self { core: TransportCore::new(), uri: uri.into(), peers, objects, presence }
    }

    fn object_id(&self) -> &str {
        self.uri.split_once(':').map_or(self.uri.as_str(), |(_, id)| id)
    }
}

impl Transport for InlineTransport {
    fn kind(&self) -> TransportKind { TransportKind::Inline }

    fn core(&self) -> &TransportCore { &self.core }

    fn core_mut(&mut self) -> &mut TransportCore { &mut self.core }

    fn start(&mut self, signals: SignalSender) {
        self.core.begin();

        let Some(peer) = select_reachable(self.presence.as_ref(), &self.peers) else {
            signals.send(Signal::Error(TransportError::unreachable("inline-object data source is offline")));
            return;
        };
        debug!(uri = %self.uri, %peer, "fetching inline object");

        let fetch = self.objects.fetch(&peer, self.object_id());
        self.core.spawn(signals.clone(), async move {
            match fetch.await {
                Ok(object) => {
                    // the whole object is buffered before it is announced
                    signals.send(Signal::Data(object.data));
                    signals.send(Signal::Metadata(ByteRange::FULL));
                    signals.send(Signal::Eof);
                }
                Err(reason) => {
                    signals.send(Signal::Error(TransportError::status(format!(
                        "inline-object download failed: {reason}"
                    ))));
                }
            }
        });
    }

    fn on_signal(&mut self, signal: Signal) -> Option<TransportEvent> {
        match signal {
            Signal::Data(bytes) if self.core.is_active() => {
                self.core.stash(bytes);
                None
            }
            Signal::Metadata(_) => self.core.apply(Signal::Metadata(ByteRange::FULL)),
            other => self.core.apply(other),
        }
    }

    fn abort(&mut self, _failure: bool, _reason: &str) { self.core.release(); }
}
