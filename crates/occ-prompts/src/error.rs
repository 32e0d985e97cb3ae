use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template not found: {0}")]
    NotFound(String),

    #[error("no default template configured")]
    NoDefault,

    #[error(transparent)]
    Vector(#[from] occ_vector::VectorError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("embedding provider error: {0}")]
    Embedding(#[from] occ_core::OrchestrationError),
}

pub type Result<T> = std::result::Result<T, PromptError>;
