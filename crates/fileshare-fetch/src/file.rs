use chrono::{DateTime, Utc};
use fileshare_verify::DigestSet;
use serde::{Deserialize, Serialize};

use crate::range::ByteRange;

/// Preview image attached to a file descriptor, referenced by URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub uri:        String,
    pub media_type: String,
    pub width:      u32,
    pub height:     u32,
}

/// Description of a payload as offered in a peer transfer or announced to
/// peers. Every field except the digests is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date:        Option<DateTime<Utc>>,
    #[serde(default)]
    pub digests:     DigestSet,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name:        String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size:        Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub media_type:  String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range:       Option<ByteRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail:   Option<Thumbnail>,
    /// Waveform samples of a voice clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplitudes:  Option<Vec<u8>>,
}

impl FileDescriptor {
    /// A copy requesting `range`, or the whole file when `range` is not ranged.
    pub fn with_range(&self, range: ByteRange) -> Self {
        Self { range: range.is_ranged().then_some(range), ..self.clone() }
    }
}
