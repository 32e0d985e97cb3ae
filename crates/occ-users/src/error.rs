use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("api key not found or inactive")]
    InvalidApiKey,

    #[error("access request not found: {0}")]
    RequestNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing error: {0}")]
    Hash(String),
}

pub type Result<T> = std::result::Result<T, UserError>;
