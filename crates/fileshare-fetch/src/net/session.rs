use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use super::BoxStream;
use crate::error::TransportError;
use crate::file::FileDescriptor;
use crate::peer::PeerId;
use crate::range::ByteRange;

/// Which side of the file transfer the local session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    /// The remote side sends the file; used for downloads.
    Responder,
}

/// Why a session ended, or why we end it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Success,
    Decline,
    FailedApplication,
    Other(String),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Success => f.write_str("success"),
            Termination::Decline => f.write_str("decline"),
            Termination::FailedApplication => f.write_str("failed-application"),
            Termination::Other(reason) => f.write_str(reason),
        }
    }
}

/// File-transfer content proposed when opening a session.
#[derive(Debug, Clone)]
pub struct FileOffer {
    pub file:      FileDescriptor,
    pub role:      Role,
    /// Deliver bytes as they arrive instead of to a file.
    pub streaming: bool,
}

pub enum SessionEvent {
    /// The remote accepted; `granted` may differ from the requested range.
    ConnectionReady {
        granted:    ByteRange,
        connection: BoxStream<'static, Result<Bytes, TransportError>>,
    },
    /// The remote proposed additional content on this session.
    ContentProposed,
    Finished(Termination),
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::ConnectionReady { granted, .. } => {
                f.debug_struct("ConnectionReady").field("granted", granted).finish_non_exhaustive()
            }
            SessionEvent::ContentProposed => f.write_str("ContentProposed"),
            SessionEvent::Finished(reason) => f.debug_tuple("Finished").field(reason).finish(),
        }
    }
}

/// Control side of a live session.
pub trait SessionControl: Send + Sync {
    /// Ask the session to end. Fire-and-forget; the outcome arrives as
    /// [`SessionEvent::Finished`].
    fn terminate(&self, reason: Termination, text: &str);
}

pub struct PeerSession {
    pub control: Arc<dyn SessionControl>,
    pub events:  mpsc::UnboundedReceiver<SessionEvent>,
}

/// Outbound session factory of the peer layer.
pub trait PeerSessions: Send + Sync {
    /// Open a session to `peer` carrying `offer` and initiate it.
    ///
    /// Fails synchronously when file transfer is unavailable.
    fn initiate(&self, peer: &PeerId, offer: FileOffer) -> Result<PeerSession, String>;
}
