use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("malformed digest value: {0}")]
    MalformedValue(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
