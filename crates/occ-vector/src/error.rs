use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("embedding has {got} dimensions, collection {collection} expects {expected}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        got: usize,
    },
    #[error("collection {0} is not registered")]
    CollectionMissing(String),
    #[error("embedding contains NaN or infinite components")]
    NonFiniteEmbedding,
    #[error("vector backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, VectorError>;
