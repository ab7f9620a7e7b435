use std::path::PathBuf;

use fileshare_fetch::DownloadError;
use fileshare_store::CacheError;
use fileshare_verify::VerifyError;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("failed to access {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fs(#[from] fileshare_fs::Error),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("local identity has no active session to address")]
    NoIdentity,

    #[error("no source can be advertised")]
    NoSources,

    #[error("remote items cannot be published")]
    RemoteItem,

    #[error("item has no backing file")]
    NoBackingFile,
}

impl ShareError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ShareError::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, ShareError>;
