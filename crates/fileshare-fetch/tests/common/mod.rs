//! In-memory stand-ins for the services transports talk to.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use fileshare_fetch::net::{
    BoxStream, FileOffer, HttpClient, HttpResponse, InlineObject, InlineObjects, PeerSession, PeerSessions,
    SessionControl, SessionEvent, Termination,
};
use fileshare_fetch::{ByteRange, PeerId, Presence, TransportError, Transports};
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;

pub fn peer(s: &str) -> PeerId { s.parse().unwrap() }

pub fn payload(len: usize) -> Vec<u8> { (0..len).map(|i| (i % 251) as u8).collect() }

fn chunked(data: &[u8], size: usize) -> Vec<Bytes> { data.chunks(size).map(Bytes::copy_from_slice).collect() }

#[derive(Clone)]
pub enum Reply {
    Response {
        status:        u16,
        content_range: Option<String>,
        chunks:        Vec<Result<Bytes, TransportError>>,
    },
    Unreachable,
    /// The client itself panics while the request is in flight.
    Panic,
}

impl Reply {
    pub fn ok(data: &[u8]) -> Self {
        Reply::Response { status: 200, content_range: None, chunks: chunked(data, 128).into_iter().map(Ok).collect() }
    }

    pub fn partial(data: &[u8], content_range: &str) -> Self {
        Reply::Response {
            status:        206,
            content_range: Some(content_range.to_string()),
            chunks:        chunked(data, 128).into_iter().map(Ok).collect(),
        }
    }

    pub fn status(status: u16) -> Self { Reply::Response { status, content_range: None, chunks: vec![] } }

    /// A 200 whose body breaks after `data`.
    pub fn broken(data: &[u8]) -> Self {
        let mut chunks: Vec<_> = chunked(data, 128).into_iter().map(Ok).collect();
        chunks.push(Err(TransportError::status("connection reset")));
        Reply::Response { status: 200, content_range: None, chunks }
    }
}

#[derive(Default)]
pub struct MockHttp {
    replies:      Mutex<HashMap<String, Reply>>,
    pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockHttp {
    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub fn requested(&self) -> Vec<String> { self.requests.lock().unwrap().iter().map(|(u, _)| u.clone()).collect() }
}

impl HttpClient for MockHttp {
    fn get(&self, url: &str, headers: &[(String, String)]) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        self.requests.lock().unwrap().push((url.to_string(), headers.to_vec()));
        let reply = self.replies.lock().unwrap().get(url).cloned().unwrap_or(Reply::Unreachable);
        Box::pin(async move {
            match reply {
                Reply::Unreachable => Err(TransportError::unreachable("connection refused")),
                Reply::Panic => panic!("http client crashed"),
                Reply::Response { status, content_range, chunks } => {
                    let body: BoxStream<'static, _> = Box::pin(futures_util::stream::iter(chunks));
                    Ok(HttpResponse { status, content_range, body })
                }
            }
        })
    }
}

pub struct MockPresence {
    pub local:  Option<PeerId>,
    pub online: HashSet<PeerId>,
}

impl MockPresence {
    pub fn new(local: &str, online: &[&str]) -> Self {
        Self { local: Some(peer(local)), online: online.iter().map(|p| peer(p)).collect() }
    }
}

impl Presence for MockPresence {
    fn local_identity(&self) -> Option<PeerId> { self.local.clone() }

    fn is_reachable(&self, peer: &PeerId) -> bool { self.online.contains(peer) }
}

#[derive(Clone)]
pub enum Step {
    Ready { granted: ByteRange, data: Vec<u8> },
    Propose,
    Finish(Termination),
}

struct MockControl {
    events:       mpsc::UnboundedSender<SessionEvent>,
    terminations: Arc<Mutex<Vec<Termination>>>,
}

impl SessionControl for MockControl {
    fn terminate(&self, reason: Termination, _text: &str) {
        self.terminations.lock().unwrap().push(reason.clone());
        let _ = self.events.send(SessionEvent::Finished(reason));
    }
}

#[derive(Default)]
pub struct MockSessions {
    script:           Mutex<Vec<Step>>,
    pub offers:       Mutex<Vec<(PeerId, FileOffer)>>,
    pub terminations: Arc<Mutex<Vec<Termination>>>,
}

impl MockSessions {
    pub fn script(steps: Vec<Step>) -> Self { Self { script: Mutex::new(steps), ..Self::default() } }

    pub fn offered(&self) -> usize { self.offers.lock().unwrap().len() }
}

impl PeerSessions for MockSessions {
    fn initiate(&self, peer: &PeerId, offer: FileOffer) -> Result<PeerSession, String> {
        self.offers.lock().unwrap().push((peer.clone(), offer));
        let (tx, rx) = mpsc::unbounded_channel();
        for step in self.script.lock().unwrap().iter().cloned() {
            let event = match step {
                Step::Ready { granted, data } => {
                    let chunks: Vec<Result<Bytes, TransportError>> = chunked(&data, 64).into_iter().map(Ok).collect();
                    SessionEvent::ConnectionReady { granted, connection: Box::pin(futures_util::stream::iter(chunks)) }
                }
                Step::Propose => SessionEvent::ContentProposed,
                Step::Finish(reason) => SessionEvent::Finished(reason),
            };
            let _ = tx.send(event);
        }
        let control = MockControl { events: tx, terminations: self.terminations.clone() };
        Ok(PeerSession { control: Arc::new(control), events: rx })
    }
}

#[derive(Default)]
pub struct MockObjects {
    pub objects:   Mutex<HashMap<String, InlineObject>>,
    pub published: Mutex<Vec<(Bytes, String, Duration)>>,
}

impl MockObjects {
    pub fn with(self, id: &str, data: &[u8], media_type: &str) -> Self {
        self.objects.lock().unwrap().insert(
            id.to_string(),
            InlineObject { data: Bytes::copy_from_slice(data), media_type: media_type.to_string() },
        );
        self
    }
}

impl InlineObjects for MockObjects {
    fn fetch(&self, _peer: &PeerId, id: &str) -> BoxFuture<'static, Result<InlineObject, String>> {
        let found = self.objects.lock().unwrap().get(id).cloned();
        Box::pin(async move { found.ok_or_else(|| "item-not-found".to_string()) })
    }

    fn publish(&self, data: Bytes, media_type: &str, ttl: Duration) -> String {
        let mut published = self.published.lock().unwrap();
        published.push((data, media_type.to_string(), ttl));
        format!("sha1+{}@bob.xmpp.org", published.len())
    }
}

pub struct Services {
    pub http:     Arc<MockHttp>,
    pub sessions: Arc<MockSessions>,
    pub objects:  Arc<MockObjects>,
    pub presence: Arc<MockPresence>,
}

impl Services {
    pub fn new(http: MockHttp) -> Self {
        Self {
            http:     Arc::new(http),
            sessions: Arc::new(MockSessions::default()),
            objects:  Arc::new(MockObjects::default()),
            presence: Arc::new(MockPresence::new("me@capulet.lit/phone", &["juliet@capulet.lit/balcony"])),
        }
    }

    pub fn sessions(mut self, sessions: MockSessions) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    pub fn objects(mut self, objects: MockObjects) -> Self {
        self.objects = Arc::new(objects);
        self
    }

    pub fn transports(&self) -> Arc<Transports> {
        Arc::new(Transports {
            http:     self.http.clone(),
            sessions: self.sessions.clone(),
            objects:  self.objects.clone(),
            presence: self.presence.clone(),
        })
    }
}
