//! Source descriptors and their ranking.
//!
//! Two orders are in play and they are opposite to each other:
//!
//! - [`RankedSources`] is a worklist in *ascending* priority. The downloader
//!   pops from the tail, so the best source is tried first.
//! - The wire form ([`RankedSources::into_wire_order`]) lists the best source
//!   *first*, which is the ascending order reversed.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

/// The kind of a source, derived from its URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Bulk transfer over HTTP(S).
    Http,
    /// Bulk transfer over FTP.
    Ftp,
    /// Session-negotiated transfer from a chat peer.
    Peer,
    /// Small object fetched in one shot from a peer.
    Inline,
    Unknown,
}

/// Which adapter family handles a source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Bulk,
    Peer,
    Inline,
}

impl SourceKind {
    pub fn of(uri: &str) -> Self {
        let Some((scheme, _)) = uri.split_once(':') else {
            return SourceKind::Unknown;
        };
        match scheme.to_ascii_lowercase().as_str() {
            "http" | "https" => SourceKind::Http,
            "ftp" | "ftps" => SourceKind::Ftp,
            "xmpp" => SourceKind::Peer,
            "cid" => SourceKind::Inline,
            _ => SourceKind::Unknown,
        }
    }

    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            SourceKind::Http | SourceKind::Ftp => Some(TransportKind::Bulk),
            SourceKind::Peer => Some(TransportKind::Peer),
            SourceKind::Inline => Some(TransportKind::Inline),
            SourceKind::Unknown => None,
        }
    }

    pub fn is_bulk(&self) -> bool { self.transport() == Some(TransportKind::Bulk) }
}

/// One alternative location of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub uri:  String,
    pub kind: SourceKind,
}

impl Source {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let kind = SourceKind::of(&uri);
        Self { uri, kind }
    }
}

/// Total order over source kinds, lowest priority first.
///
/// Kinds not listed are not ranked and never downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePriority(Vec<SourceKind>);

impl Default for SourcePriority {
    fn default() -> Self {
        Self(vec![SourceKind::Inline, SourceKind::Peer, SourceKind::Ftp, SourceKind::Http])
    }
}

impl SourcePriority {
    pub fn new(lowest_first: Vec<SourceKind>) -> Self {
        let mut order: Vec<SourceKind> = Vec::with_capacity(lowest_first.len());
        for kind in lowest_first {
            if kind != SourceKind::Unknown && !order.contains(&kind) {
                order.push(kind);
            }
        }
        Self(order)
    }

    pub fn rank(&self, kind: SourceKind) -> Option<usize> {
        self.0.iter().position(|k| *k == kind)
    }

    /// Rank `uris` into a worklist. Among sources of the same kind the one
    /// listed first is popped first.
    pub fn rank_sources<I, S>(&self, uris: I) -> RankedSources
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranked: Vec<(usize, Reverse<usize>, Source)> = uris
            .into_iter()
            .map(Source::new)
            .enumerate()
            .filter_map(|(index, s)| self.rank(s.kind).map(|r| (r, Reverse(index), s)))
            .collect();
        ranked.sort_by_key(|(rank, index, _)| (*rank, *index));
        RankedSources(ranked.into_iter().map(|(_, _, s)| s).collect())
    }
}

/// Sources for one payload in ascending priority, consumed from the tail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedSources(Vec<Source>);

impl RankedSources {
    /// Take the highest-priority remaining source.
    pub fn pop(&mut self) -> Option<Source> { self.0.pop() }

    /// The source [`pop`](Self::pop) would return next.
    pub fn best(&self) -> Option<&Source> { self.0.last() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Ascending order, lowest priority first.
    pub fn iter(&self) -> std::slice::Iter<'_, Source> { self.0.iter() }

    /// Best-first URIs, the order descriptors announce sources in.
    pub fn into_wire_order(self) -> Vec<String> {
        self.0.into_iter().rev().map(|s| s.uri).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uris(ranked: &RankedSources) -> Vec<&str> { ranked.iter().map(|s| s.uri.as_str()).collect() }

    #[test]
    fn kind_from_scheme() {
        assert_eq!(SourceKind::of("https://example.org/a.png"), SourceKind::Http);
        assert_eq!(SourceKind::of("HTTP://example.org/a.png"), SourceKind::Http);
        assert_eq!(SourceKind::of("ftp://example.org/a.png"), SourceKind::Ftp);
        assert_eq!(SourceKind::of("xmpp:juliet@capulet.lit/balcony?jingle-ft"), SourceKind::Peer);
        assert_eq!(SourceKind::of("cid:sha1+8f35fef110ffc5df08d579a50083ff9308fb6242@bob.xmpp.org"), SourceKind::Inline);
        assert_eq!(SourceKind::of("magnet:?xt=urn:btih:abc"), SourceKind::Unknown);
        assert_eq!(SourceKind::of("no scheme"), SourceKind::Unknown);
    }

    #[test]
    fn unknown_sources_are_excluded() {
        let ranked = SourcePriority::default().rank_sources(["gopher://x", "http://a"]);
        assert_eq!(uris(&ranked), vec!["http://a"]);
    }

    #[test]
    fn ascending_order_pops_best_first() {
        let mut ranked = SourcePriority::default().rank_sources([
            "http://a",
            "cid:blob@x",
            "xmpp:peer@x/r?jingle-ft",
            "ftp://b",
        ]);
        assert_eq!(uris(&ranked), vec!["cid:blob@x", "xmpp:peer@x/r?jingle-ft", "ftp://b", "http://a"]);
        assert_eq!(ranked.pop().unwrap().uri, "http://a");
        assert_eq!(ranked.pop().unwrap().uri, "ftp://b");
        assert_eq!(ranked.best().unwrap().kind, SourceKind::Peer);
    }

    #[test]
    fn same_kind_ties_pop_first_listed_first() {
        let mut ranked = SourcePriority::default().rank_sources(["http://first", "http://second", "http://third"]);
        assert_eq!(ranked.pop().unwrap().uri, "http://first");
        assert_eq!(ranked.pop().unwrap().uri, "http://second");
        assert_eq!(ranked.pop().unwrap().uri, "http://third");
        assert!(ranked.pop().is_none());
    }

    #[test]
    fn wire_order_keeps_announced_order_within_a_kind() {
        let announced = ["http://a", "xmpp:p@x/r?jingle-ft", "http://b", "xmpp:q@x/r?jingle-ft"];
        let ranked = SourcePriority::default().rank_sources(announced);
        assert_eq!(
            ranked.into_wire_order(),
            vec!["http://a", "http://b", "xmpp:p@x/r?jingle-ft", "xmpp:q@x/r?jingle-ft"]
        );
    }

    #[test]
    fn wire_order_is_worklist_reversed() {
        let ranked = SourcePriority::default().rank_sources(["xmpp:p@x/r?jingle-ft", "http://a"]);
        assert_eq!(ranked.into_wire_order(), vec!["http://a", "xmpp:p@x/r?jingle-ft"]);
    }

    #[test]
    fn custom_priority_drops_unlisted_kinds() {
        let priority = SourcePriority::new(vec![SourceKind::Http, SourceKind::Peer, SourceKind::Unknown]);
        let mut ranked = priority.rank_sources(["http://a", "xmpp:p@x/r?jingle-ft", "cid:c@x"]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked.pop().unwrap().kind, SourceKind::Peer);
    }
}
