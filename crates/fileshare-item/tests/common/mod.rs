#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use fileshare_fetch::net::{
    BoxStream, FileOffer, HttpClient, HttpResponse, InlineObject, InlineObjects, PeerSession, PeerSessions,
};
use fileshare_fetch::{DownloadConfig, PeerId, Presence, TransportError, Transports};
use fileshare_item::{
    Discovery, ShareConfig, ShareContext, ThumbnailRenderer, UploadEvent, UploadHandle, UploadService,
};
use fileshare_store::DirCache;
use futures_util::future::BoxFuture;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const LOCAL: &str = "me@capulet.lit/phone";

#[derive(Default)]
pub struct MockHttp {
    pub bodies: Mutex<HashMap<String, Vec<u8>>>,
}

impl HttpClient for MockHttp {
    fn get(&self, url: &str, _headers: &[(String, String)]) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let body = self.bodies.lock().unwrap().get(url).cloned();
        Box::pin(async move {
            let body = body.ok_or_else(|| TransportError::unreachable("no route"))?;
            let stream: BoxStream<'static, _> = Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from(body))]));
            Ok(HttpResponse { status: 200, content_range: None, body: stream })
        })
    }
}

pub struct NoSessions;

impl PeerSessions for NoSessions {
    fn initiate(&self, _peer: &PeerId, _offer: FileOffer) -> Result<PeerSession, String> {
        Err("file transfer unavailable".to_string())
    }
}

#[derive(Default)]
pub struct MockObjects {
    pub published: Mutex<Vec<(String, Duration)>>,
}

impl InlineObjects for MockObjects {
    fn fetch(&self, _peer: &PeerId, _id: &str) -> BoxFuture<'static, Result<InlineObject, String>> {
        Box::pin(async { Err("item-not-found".to_string()) })
    }

    fn publish(&self, _data: Bytes, media_type: &str, ttl: Duration) -> String {
        let mut published = self.published.lock().unwrap();
        published.push((media_type.to_string(), ttl));
        format!("sha1+{}@bob.xmpp.org", published.len())
    }
}

pub struct MockPresence(pub Option<PeerId>);

impl Presence for MockPresence {
    fn local_identity(&self) -> Option<PeerId> { self.0.clone() }

    fn is_reachable(&self, _peer: &PeerId) -> bool { true }
}

/// Upload service answering every upload with a fixed result.
pub struct MockUploads {
    pub discovery: Discovery,
    pub result:    Result<String, String>,
    pub uploads:   Mutex<Vec<(PathBuf, String)>>,
}

impl MockUploads {
    pub fn new(result: Result<&str, &str>) -> Self {
        Self {
            discovery: Discovery::Found,
            result:    result.map(str::to_string).map_err(str::to_string),
            uploads:   Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize { self.uploads.lock().unwrap().len() }
}

impl UploadService for MockUploads {
    fn discovery(&self) -> Discovery { self.discovery }

    fn upload(&self, path: &Path, name: &str, _media_type: &str) -> UploadHandle {
        self.uploads.lock().unwrap().push((path.to_path_buf(), name.to_string()));
        let (tx, events) = mpsc::unbounded_channel();
        tx.send(UploadEvent::Progress { sent: 10, total: 20 }).unwrap();
        tx.send(UploadEvent::Progress { sent: 20, total: 20 }).unwrap();
        tx.send(UploadEvent::Finished(self.result.clone())).unwrap();
        UploadHandle { events }
    }
}

pub struct SolidThumbnails;

impl ThumbnailRenderer for SolidThumbnails {
    fn render_png(&self, _path: &Path, media_type: &str, _size: u32) -> Option<Vec<u8>> {
        media_type.starts_with("image/").then(|| b"\x89PNG\r\n\x1a\nthumb".to_vec())
    }
}

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRpixels";

pub struct Fixture {
    pub dir:     TempDir,
    pub http:    Arc<MockHttp>,
    pub objects: Arc<MockObjects>,
    pub uploads: Arc<MockUploads>,
    pub cache:   Arc<DirCache>,
    pub local:   Option<PeerId>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["tmp", "docs"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let cache = Arc::new(DirCache::open(dir.path().join("cache")).unwrap());
        Self {
            dir,
            http: Arc::new(MockHttp::default()),
            objects: Arc::new(MockObjects::default()),
            uploads: Arc::new(MockUploads::new(Ok("https://upload.example/abc/file"))),
            cache,
            local: Some(LOCAL.parse().unwrap()),
        }
    }

    pub fn uploads(mut self, uploads: MockUploads) -> Self {
        self.uploads = Arc::new(uploads);
        self
    }

    pub fn temp_dir(&self) -> PathBuf { self.dir.path().join("tmp") }

    pub fn temp_files(&self) -> usize { std::fs::read_dir(self.temp_dir()).unwrap().count() }

    pub fn context(&self) -> Arc<ShareContext> {
        let config = ShareConfig {
            temp_dir: self.temp_dir(),
            download: DownloadConfig::new(self.dir.path().join("docs")),
            ..ShareConfig::default()
        };
        let transports = Arc::new(Transports {
            http:     self.http.clone(),
            sessions: Arc::new(NoSessions),
            objects:  self.objects.clone(),
            presence: Arc::new(MockPresence(self.local.clone())),
        });
        Arc::new(
            ShareContext::new(config, self.cache.clone(), transports)
                .uploads(self.uploads.clone())
                .thumbnails(Arc::new(SolidThumbnails)),
        )
    }
}
