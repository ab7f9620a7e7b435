use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Fs(#[from] fileshare_fs::Error),

    #[error("cache I/O on {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache index: {0}")]
    Index(#[from] serde_json::Error),

    #[error("cache entry needs at least one digest")]
    NoDigests,

    #[error("link entry has no link path")]
    MissingLink,
}

pub type Result<T> = std::result::Result<T, CacheError>;
