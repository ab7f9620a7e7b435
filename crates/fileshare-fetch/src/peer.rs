//! Peer addressing and reachability.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Address of a chat peer: `[node@]domain[/resource]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId {
    node:     Option<String>,
    domain:   String,
    resource: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid peer address: {0}")]
pub struct ParsePeerIdError(pub String);

impl PeerId {
    pub fn node(&self) -> Option<&str> { self.node.as_deref() }

    pub fn domain(&self) -> &str { &self.domain }

    pub fn resource(&self) -> Option<&str> { self.resource.as_deref() }

    /// The same address with `resource` attached.
    pub fn with_resource(&self, resource: impl Into<String>) -> Self {
        Self { resource: Some(resource.into()), ..self.clone() }
    }

    /// The address without its resource.
    pub fn bare(&self) -> Self { Self { resource: None, ..self.clone() } }
}

impl FromStr for PeerId {
    type Err = ParsePeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParsePeerIdError(s.to_string());

        let (address, resource) = match s.split_once('/') {
            Some((address, resource)) if !resource.is_empty() => (address, Some(resource.to_string())),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };
        let (node, domain) = match address.split_once('@') {
            Some((node, domain)) if !node.is_empty() => (Some(node.to_string()), domain),
            Some(_) => return Err(invalid()),
            None => (None, address),
        };
        if domain.is_empty() || domain.contains(['@', ' ', '?', ';']) {
            return Err(invalid());
        }

        Ok(Self { node, domain: domain.to_ascii_lowercase(), resource })
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = &self.node {
            write!(f, "{node}@")?;
        }
        f.write_str(&self.domain)?;
        if let Some(resource) = &self.resource {
            write!(f, "/{resource}")?;
        }
        Ok(())
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The account's view of who is online.
pub trait Presence: Send + Sync {
    /// Full address of the local session, if one is active.
    fn local_identity(&self) -> Option<PeerId>;

    /// Whether `peer` is an active session participant right now.
    fn is_reachable(&self, peer: &PeerId) -> bool;
}

/// First candidate that is reachable and is not the local session.
pub fn select_reachable(presence: &dyn Presence, candidates: &[PeerId]) -> Option<PeerId> {
    let local = presence.local_identity();
    candidates
        .iter()
        .filter(|peer| local.as_ref() != Some(*peer))
        .find(|peer| presence.is_reachable(peer))
        .cloned()
}
