//! Media type detection for payloads without a declared type.

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Bytes of the payload head that [`sniff`] looks at.
pub const SNIFF_LEN: u64 = 512;

const MAGIC: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"OggS", "audio/ogg"),
    (b"ID3", "audio/mpeg"),
    (b"fLaC", "audio/flac"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/ogg"),
    ("mp3", "audio/mpeg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("m4a", "audio/mp4"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("json", "application/json"),
];

fn riff_form(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 || &data[..4] != b"RIFF" {
        return None;
    }
    match &data[8..12] {
        b"WEBP" => Some("image/webp"),
        b"WAVE" => Some("audio/wav"),
        _ => None,
    }
}

fn iso_media(data: &[u8]) -> Option<&'static str> {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return None;
    }
    match &data[8..12] {
        b"M4A " => Some("audio/mp4"),
        _ => Some("video/mp4"),
    }
}

/// Media type from the payload head, then from the file name.
pub fn sniff(head: &[u8], file_name: Option<&str>) -> String {
    let by_magic = MAGIC
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, media_type)| *media_type)
        .or_else(|| riff_form(head))
        .or_else(|| iso_media(head));

    by_magic
        .or_else(|| file_name.and_then(from_file_name))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

pub fn from_file_name(name: &str) -> Option<&'static str> {
    let (_, ext) = fileshare_fs::split_name(name);
    let ext = ext?.to_ascii_lowercase();
    EXTENSIONS.iter().find(|(e, _)| *e == ext).map(|(_, media_type)| *media_type)
}

/// Preferred file extension for `media_type`, without the dot.
pub fn extension_for(media_type: &str) -> Option<&'static str> {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    EXTENSIONS.iter().find(|(_, m)| m.eq_ignore_ascii_case(essence)).map(|(ext, _)| *ext)
}
