use std::sync::Arc;

use fileshare_fetch::Transports;
use fileshare_store::CacheBridge;

use crate::config::ShareConfig;
use crate::thumbnail::{NoThumbnails, ThumbnailRenderer};
use crate::upload::{NoUploads, UploadService};

/// The collaborators every [`ShareItem`](crate::ShareItem) works with.
pub struct ShareContext {
    pub config:     ShareConfig,
    pub cache:      Arc<dyn CacheBridge>,
    pub transports: Arc<Transports>,
    pub uploads:    Arc<dyn UploadService>,
    pub thumbnails: Arc<dyn ThumbnailRenderer>,
}

impl ShareContext {
    pub fn new(config: ShareConfig, cache: Arc<dyn CacheBridge>, transports: Arc<Transports>) -> Self {
        Self {
            config,
            cache,
            transports,
            uploads: Arc::new(NoUploads),
            thumbnails: Arc::new(NoThumbnails),
        }
    }

    pub fn uploads(mut self, uploads: Arc<dyn UploadService>) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn thumbnails(mut self, thumbnails: Arc<dyn ThumbnailRenderer>) -> Self {
        self.thumbnails = thumbnails;
        self
    }
}
