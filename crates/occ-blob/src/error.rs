use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("backend request failed: {0}")]
    BackendUnavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, BlobError>;
