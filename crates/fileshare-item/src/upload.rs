use std::path::Path;

use tokio::sync::mpsc;

/// Whether the account has an upload service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    Pending,
    Found,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Progress { sent: u64, total: u64 },
    /// The public URL of the upload, or why it failed.
    Finished(Result<String, String>),
}

/// A running upload. Ends after [`UploadEvent::Finished`].
pub struct UploadHandle {
    pub events: mpsc::UnboundedReceiver<UploadEvent>,
}

/// Outbound upload service publishing payloads at public URLs.
pub trait UploadService: Send + Sync {
    fn discovery(&self) -> Discovery;

    fn upload(&self, path: &Path, name: &str, media_type: &str) -> UploadHandle;
}

/// Stand-in for accounts without an upload service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUploads;

impl UploadService for NoUploads {
    fn discovery(&self) -> Discovery { Discovery::NotFound }

    fn upload(&self, _path: &Path, _name: &str, _media_type: &str) -> UploadHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let _ = tx.send(UploadEvent::Finished(Err("no upload service".to_string())));
        UploadHandle { events }
    }
}
