mod common;

use std::fs;

use common::*;
use fileshare_fetch::{ByteRange, DownloadEvent, FileDescriptor, SourceKind};
use fileshare_item::{Discovery, ItemEvent, MediaShare, Origin, ReferenceKind, ShareError, ShareItem};
use fileshare_store::{CacheBridge, ItemMetadata};
use fileshare_verify::{Digest, DigestSet, VerifyError};

fn announced(data: &[u8], name: &str, sources: &[&str]) -> MediaShare {
    MediaShare {
        file:    FileDescriptor {
            digests: Digest::of_bytes(data).into(),
            name: name.to_string(),
            size: Some(data.len() as u64),
            media_type: "image/png".to_string(),
            ..Default::default()
        },
        sources: sources.iter().map(|s| s.to_string()).collect(),
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ItemEvent>) -> Vec<ItemEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn identical_content_is_deduplicated() {
    let fx = Fixture::new();
    let ctx = fx.context();

    let mut first = ShareItem::from_png(ctx.clone(), PNG_BYTES).unwrap();
    assert_eq!(first.origin(), Origin::TempFile);
    assert_eq!(fx.temp_files(), 1);
    first.publish().await.unwrap();
    assert_eq!(first.origin(), Origin::LocalFile);
    assert_eq!(fx.temp_files(), 0);

    let second = ShareItem::from_png(ctx.clone(), PNG_BYTES).unwrap();
    assert_eq!(second.origin(), Origin::LocalFile);
    assert_eq!(second.path(), first.path());
    assert_eq!(second.digests(), first.digests());
    assert_eq!(fx.temp_files(), 0);
    assert_eq!(fx.cache.entries().len(), 1);
}

#[tokio::test]
async fn publish_is_idempotent() {
    let fx = Fixture::new();
    let mut item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    let mut events = item.subscribe();

    item.publish().await.unwrap();
    assert_eq!(fx.uploads.count(), 1);
    assert_eq!(item.sources(), ["https://upload.example/abc/file"]);
    assert_eq!(item.log(), ["Published on upload service"]);
    assert_eq!(
        drain(&mut events),
        vec![
            ItemEvent::PublishProgress(10),
            ItemEvent::PublishProgress(20),
            ItemEvent::LogChanged,
            ItemEvent::Published,
        ]
    );

    item.publish().await.unwrap();
    assert_eq!(fx.uploads.count(), 1);
    assert!(drain(&mut events).is_empty());

    let state = item.publish_state();
    assert!(state.bulk_done && state.peer_done && state.announced);
    let entry = item.cache(false).unwrap();
    assert_eq!(entry.metadata.uris, ["https://upload.example/abc/file"]);
    assert_eq!(entry.metadata.media_type, "image/png");
}

#[tokio::test]
async fn missing_upload_service_skips_upload() {
    let mut uploads = MockUploads::new(Ok("https://never"));
    uploads.discovery = Discovery::NotFound;
    let fx = Fixture::new().uploads(uploads);

    let mut item = ShareItem::from_blob(fx.context(), "audio/ogg", b"OggS voice", ItemMetadata::default()).unwrap();
    item.publish().await.unwrap();

    assert_eq!(fx.uploads.count(), 0);
    assert!(item.sources().is_empty());
    assert!(item.publish_state().announced);
}

#[tokio::test]
async fn failed_upload_is_logged_and_still_publishes() {
    let fx = Fixture::new().uploads(MockUploads::new(Err("quota exceeded")));
    let mut item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    let mut events = item.subscribe();

    item.publish().await.unwrap();

    assert!(item.sources().is_empty());
    assert_eq!(item.log(), ["Failed to publish on upload service: quota exceeded"]);
    assert!(drain(&mut events).contains(&ItemEvent::Published));
}

#[tokio::test]
async fn local_file_is_recorded_by_reference() {
    let fx = Fixture::new();
    let original = fx.dir.path().join("holiday.png");
    fs::write(&original, PNG_BYTES).unwrap();

    let mut item = ShareItem::from_local_file(fx.context(), &original).unwrap();
    assert_eq!(item.origin(), Origin::LocalLink);
    assert_eq!(item.media_type(), "image/png");
    assert_eq!(item.size(), Some(PNG_BYTES.len() as u64));

    item.publish().await.unwrap();
    assert!(original.exists());
    let entry = item.cache(false).unwrap();
    assert_eq!(entry.link(), Some(original.as_path()));

    let again = ShareItem::from_local_file(fx.context(), &original).unwrap();
    assert_eq!(again.origin(), Origin::LocalLink);
    assert_eq!(again.path(), Some(original.as_path()));
    assert!(again.publish_state().bulk_done);
}

#[test]
fn temp_file_is_removed_on_drop() {
    let fx = Fixture::new();
    let item = ShareItem::from_blob(fx.context(), "", b"plain words", ItemMetadata::default()).unwrap();
    let path = item.path().unwrap().to_path_buf();
    assert!(path.exists());
    assert_eq!(item.media_type(), "application/octet-stream");

    drop(item);
    assert!(!path.exists());
}

#[test]
fn blob_keeps_its_metadata() {
    let fx = Fixture::new();
    let meta = ItemMetadata { amplitudes: Some(vec![1, 2, 3]), ..ItemMetadata::default() };
    let item = ShareItem::from_blob(fx.context(), "audio/ogg", b"OggS....", meta).unwrap();

    assert_eq!(item.metadata().amplitudes, Some(vec![1, 2, 3]));
    assert!(item.path().unwrap().extension().is_some_and(|e| e == "ogg"));
}

#[tokio::test]
async fn full_range_is_a_whole_file_download() {
    let fx = Fixture::new();
    let data = vec![3u8; 1000];
    let mut item = ShareItem::from_share(fx.context(), &announced(&data, "a.png", &["http://a/a.png"]), LOCAL.parse().unwrap());

    let whole = item.download(ByteRange::new(0, 1000));
    assert!(whole.is_tracked());
    assert!(!whole.downloader().is_ranged());
    assert!(item.is_downloading());

    let ranged = item.download(ByteRange::new(0, 500));
    assert!(!ranged.is_tracked());
    assert_eq!(ranged.downloader().range(), ByteRange::new(0, 500));

    let duplicate = item.download(ByteRange::FULL);
    assert!(!duplicate.is_tracked());

    drop(whole);
    assert!(!item.is_downloading());
    assert!(item.download(ByteRange::FULL).is_tracked());
}

#[tokio::test]
async fn finished_download_moves_into_cache() {
    let fx = Fixture::new();
    let data = PNG_BYTES.to_vec();
    fx.http.bodies.lock().unwrap().insert("https://files.example/cat.png".into(), data.clone());
    let share = announced(&data, "cat.png", &["https://files.example/cat.png"]);
    let mut item = ShareItem::from_share(fx.context(), &share, "juliet@capulet.lit/balcony".parse().unwrap());
    let mut events = item.subscribe();
    assert_eq!(item.origin(), Origin::RemoteFile);
    assert!(item.path().is_none());

    let mut download = item.download(ByteRange::FULL);
    let path = download.drive(|_| {}).await.unwrap();

    assert!(path.starts_with(fx.cache.storage_dir()));
    assert_eq!(fs::read(&path).unwrap(), data);
    assert!(!fx.dir.path().join("docs").join("cat.png").exists());
    assert_eq!(drain(&mut events), vec![ItemEvent::DownloadFinished { success: true }]);
    assert!(!item.is_downloading());

    let entry = download.into_cache_entry().unwrap();
    assert_eq!(entry.metadata.uris, ["https://files.example/cat.png"]);
    item.adopt(entry);
    assert_eq!(item.origin(), Origin::LocalFile);
    assert_eq!(item.path(), Some(path.as_path()));
    assert!(item.publish_state().bulk_done);
}

#[tokio::test]
async fn finished_event_points_into_the_cache() {
    let fx = Fixture::new();
    let data = PNG_BYTES.to_vec();
    fx.http.bodies.lock().unwrap().insert("https://files.example/cat.png".into(), data.clone());
    let share = announced(&data, "cat.png", &["https://files.example/cat.png"]);
    let mut item = ShareItem::from_share(fx.context(), &share, "juliet@capulet.lit/balcony".parse().unwrap());

    let mut download = item.download(ByteRange::FULL);
    download.open().unwrap();
    let mut buf = [0u8; 256];
    let finished = loop {
        match download.next_event().await.unwrap() {
            DownloadEvent::Finished(result) => break result,
            _ => while download.read(&mut buf).unwrap() > 0 {},
        }
    };

    let path = finished.unwrap();
    assert!(path.starts_with(fx.cache.storage_dir()), "{}", path.display());
    assert_eq!(fs::read(&path).unwrap(), data);
    assert_eq!(download.cache_entry().unwrap().path_in(fx.cache.storage_dir()), Some(path));
    assert!(download.next_event().await.is_none());
}

#[tokio::test]
async fn corrupted_download_is_not_cached() {
    let fx = Fixture::new();
    fx.http.bodies.lock().unwrap().insert("https://files.example/cat.png".into(), b"not the announced bytes".to_vec());
    let share = announced(PNG_BYTES, "cat.png", &["https://files.example/cat.png"]);
    let mut item = ShareItem::from_share(fx.context(), &share, "juliet@capulet.lit/balcony".parse().unwrap());
    let mut events = item.subscribe();

    let mut download = item.download(ByteRange::FULL);
    let err = download.drive(|_| {}).await.unwrap_err();

    assert!(matches!(err, ShareError::Verify(VerifyError::Mismatch { .. })), "{err:?}");
    assert_eq!(drain(&mut events), vec![ItemEvent::DownloadFinished { success: false }]);
    assert!(download.cache_entry().is_none());
    assert!(!fx.dir.path().join("docs").join("cat.png").exists());
    assert!(!item.is_downloading());
    assert!(item.cache(true).is_none());
}

#[tokio::test]
async fn failed_download_releases_the_slot() {
    let fx = Fixture::new();
    let share = announced(b"gone", "gone.bin", &["https://files.example/gone"]);
    let mut item = ShareItem::from_share(fx.context(), &share, "juliet@capulet.lit/balcony".parse().unwrap());
    let mut events = item.subscribe();

    let mut download = item.download(ByteRange::FULL);
    let err = download.drive(|_| {}).await.unwrap_err();
    assert!(matches!(err, ShareError::Download(_)));
    assert_eq!(drain(&mut events), vec![ItemEvent::DownloadFinished { success: false }]);
    assert!(!item.is_downloading());
    assert!(item.cache(true).is_none());
}

#[test]
fn remote_item_matching_the_cache_is_local() {
    let fx = Fixture::new();
    let temp = fx.temp_dir().join("x.png");
    fs::write(&temp, PNG_BYTES).unwrap();
    let digest = Digest::of_bytes(PNG_BYTES);
    fx.cache
        .move_temp_to_permanent(&DigestSet::from(digest), &temp, ItemMetadata::with_media_type("image/png"), std::time::Duration::from_secs(60))
        .unwrap();

    let item = ShareItem::from_share(fx.context(), &announced(PNG_BYTES, "other.png", &[]), "juliet@capulet.lit/balcony".parse().unwrap());
    assert_eq!(item.origin(), Origin::LocalFile);
    assert!(item.path().unwrap().starts_with(fx.cache.storage_dir()));
    assert_eq!(item.peers().len(), 1);
}

#[tokio::test]
async fn reference_lists_best_source_first() {
    let fx = Fixture::new();
    let mut item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    item.set_description("sunset");
    item.publish().await.unwrap();

    let reference = item.to_reference().unwrap();
    let sources = &reference.media_share.sources;
    assert_eq!(reference.kind, ReferenceKind::Data);
    assert_eq!(sources, &vec!["https://upload.example/abc/file".to_string(), format!("xmpp:{LOCAL}?jingle-ft")]);
    assert_eq!(reference.uri, sources[0]);
    assert_eq!(SourceKind::of(&sources[1]), SourceKind::Peer);

    let file = &reference.media_share.file;
    assert_eq!(file.digests, *item.digests());
    assert_eq!(file.size, Some(PNG_BYTES.len() as u64));
    assert_eq!(file.description, "sunset");
    let thumbnail = file.thumbnail.as_ref().unwrap();
    assert_eq!(thumbnail.uri, "cid:sha1+1@bob.xmpp.org");
    assert_eq!((thumbnail.width, thumbnail.height), (64, 64));

    let published = fx.objects.published.lock().unwrap();
    assert_eq!(published[0].1, std::time::Duration::from_secs(365 * 24 * 3600));
}

#[test]
fn temp_item_thumbnail_uses_short_ttl() {
    let fx = Fixture::new();
    let item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    let reference = item.to_reference().unwrap();

    assert_eq!(reference.media_share.sources, vec![format!("xmpp:{LOCAL}?jingle-ft")]);
    let published = fx.objects.published.lock().unwrap();
    assert_eq!(published[0].1, std::time::Duration::from_secs(7 * 24 * 3600));
}

#[test]
fn reference_needs_an_addressable_session() {
    let mut fx = Fixture::new();
    fx.local = Some("me@capulet.lit".parse().unwrap());
    let item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    assert!(matches!(item.to_reference(), Err(ShareError::NoIdentity)));

    fx.local = None;
    let item = ShareItem::from_png(fx.context(), PNG_BYTES).unwrap();
    assert!(matches!(item.to_reference(), Err(ShareError::NoIdentity)));
}

#[test]
fn amplitudes_are_announced() {
    let fx = Fixture::new();
    let meta = ItemMetadata { amplitudes: Some(vec![9, 8, 7]), ..ItemMetadata::default() };
    let item = ShareItem::from_blob(fx.context(), "audio/ogg", b"OggS clip", meta).unwrap();

    let reference = item.to_reference().unwrap();
    assert_eq!(reference.media_share.file.amplitudes, Some(vec![9, 8, 7]));
    assert!(reference.media_share.file.thumbnail.is_none());
}

#[test]
fn simple_source_is_bulk_only() {
    let fx = Fixture::new();
    let peer_uri = "xmpp:juliet@capulet.lit/balcony?jingle-ft";
    let both = ShareItem::from_share(fx.context(), &announced(b"a", "a", &[peer_uri, "ftp://m/a"]), LOCAL.parse().unwrap());
    assert_eq!(both.simple_source().as_deref(), Some("ftp://m/a"));

    let peer_only = ShareItem::from_share(fx.context(), &announced(b"b", "b", &[peer_uri]), LOCAL.parse().unwrap());
    assert_eq!(peer_only.simple_source(), None);
}

#[test]
fn nameless_remote_item_is_named_by_digest() {
    let fx = Fixture::new();
    let item = ShareItem::from_share(fx.context(), &announced(b"pic", "", &[]), LOCAL.parse().unwrap());
    assert_eq!(item.display_name(), format!("share-{}.png", Digest::of_bytes(b"pic").to_hex()));
}

#[tokio::test]
async fn remote_items_cannot_be_published() {
    let fx = Fixture::new();
    let mut item = ShareItem::from_share(fx.context(), &announced(b"r", "r", &[]), LOCAL.parse().unwrap());
    assert!(matches!(item.publish().await, Err(ShareError::RemoteItem)));
}
