//! Error types for fileshare-fetch.

use std::fmt;
use std::path::PathBuf;

/// Classification of a transport failure, deciding whether the orchestrator
/// may fall back to the next source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No reachable peer, or the backing service is absent.
    SourceUnreachable,
    /// The remote answered with something the protocol does not allow.
    ProtocolViolation,
    /// The transport reported a non-success status or termination reason.
    TransportStatus,
    /// The staging file could not be opened or written.
    LocalIo,
    /// Every ranked source was tried.
    NoSourcesRemaining,
}

impl ErrorKind {
    /// Whether a failure of this kind may be retried with the next source,
    /// provided no metadata was reported yet.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::SourceUnreachable | ErrorKind::TransportStatus)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::SourceUnreachable => "source unreachable",
            ErrorKind::ProtocolViolation => "protocol violation",
            ErrorKind::TransportStatus => "transport status",
            ErrorKind::LocalIo => "local I/O failure",
            ErrorKind::NoSourcesRemaining => "no sources remaining",
        };
        f.write_str(s)
    }
}

/// A failure reported by one transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind:    ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SourceUnreachable, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolViolation, message)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportStatus, message)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    #[error("download sources are not given")]
    NoSources,

    #[error("download is already open")]
    AlreadyOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("staging file {path}: {message}")]
    Staging { path: PathBuf, message: String },
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::NoSources | DownloadError::AlreadyOpen => ErrorKind::NoSourcesRemaining,
            DownloadError::Transport(e) => e.kind,
            DownloadError::Staging { .. } => ErrorKind::LocalIo,
        }
    }

    pub(crate) fn staging(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        DownloadError::Staging { path: path.into(), message: source.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
