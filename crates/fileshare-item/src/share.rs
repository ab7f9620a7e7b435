//! Descriptors announcing a payload to peers.

use fileshare_fetch::FileDescriptor;
use serde::{Deserialize, Serialize};

/// A file together with the places it can be fetched from, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaShare {
    pub file:    FileDescriptor,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Mention,
    Data,
}

/// Message reference attaching a shared payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind:        ReferenceKind,
    /// The best source.
    pub uri:         String,
    pub media_share: MediaShare,
}
