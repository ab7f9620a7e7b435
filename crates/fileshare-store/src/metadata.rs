use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata stored with a cache entry.
///
/// Known keys are typed; anything else a caller attaches is kept in `extra`
/// and round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub media_type:       String,
    /// Sources the payload was published to or fetched from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris:             Vec<String>,
    /// External path of a payload that is referenced rather than stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link:             Option<PathBuf>,
    #[serde(rename = "thumb-mt", default, skip_serializing_if = "Option::is_none")]
    pub thumb_media_type: Option<String>,
    #[serde(rename = "thumb-uri", default, skip_serializing_if = "Option::is_none")]
    pub thumb_uri:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    pub amplitudes:       Option<Vec<u8>>,
    #[serde(flatten)]
    pub extra:            BTreeMap<String, serde_json::Value>,
}

impl ItemMetadata {
    pub fn with_media_type(media_type: impl Into<String>) -> Self {
        Self { media_type: media_type.into(), ..Self::default() }
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
