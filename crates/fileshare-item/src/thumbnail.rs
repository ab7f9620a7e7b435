use std::path::Path;

/// Renders preview images for local payloads.
pub trait ThumbnailRenderer: Send + Sync {
    /// A `size`×`size` PNG for the file at `path`, or `None` when the
    /// payload has no visual preview.
    fn render_png(&self, path: &Path, media_type: &str, size: u32) -> Option<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

impl ThumbnailRenderer for NoThumbnails {
    fn render_png(&self, _path: &Path, _media_type: &str, _size: u32) -> Option<Vec<u8>> { None }
}
