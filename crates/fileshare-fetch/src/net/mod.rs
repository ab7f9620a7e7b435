//! Boundaries to the services the transports drive.
//!
//! The bulk-transfer client, the peer session layer and the inline object
//! service live outside this crate. Each is described by a small trait so
//! the transports can be exercised against in-memory implementations.

pub mod http;
pub mod objects;
pub mod session;

use std::pin::Pin;

use futures_util::Stream;

/// A boxed stream type for transfer bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

pub use http::{HttpClient, HttpResponse};
pub use objects::{InlineObject, InlineObjects};
pub use session::{FileOffer, PeerSession, PeerSessions, Role, SessionControl, SessionEvent, Termination};

#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
