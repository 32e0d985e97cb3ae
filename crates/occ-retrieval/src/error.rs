use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Vector(#[from] occ_vector::VectorError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding provider error: {0}")]
    Embedding(#[from] occ_core::OrchestrationError),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
