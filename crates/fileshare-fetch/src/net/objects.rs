use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::peer::PeerId;

/// A small object received in one piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineObject {
    pub data:       Bytes,
    pub media_type: String,
}

/// Peer-hosted store of small content-addressed objects.
pub trait InlineObjects: Send + Sync {
    /// Request object `id` from `peer`. Errors carry a human-readable reason.
    fn fetch(&self, peer: &PeerId, id: &str) -> BoxFuture<'static, Result<InlineObject, String>>;

    /// Register `data` for other peers to fetch and return its object id.
    fn publish(&self, data: Bytes, media_type: &str, ttl: Duration) -> String;
}
