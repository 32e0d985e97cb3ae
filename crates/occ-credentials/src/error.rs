use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential record for user {user_id}")]
    TokenMissing { user_id: String },

    #[error("credential for user {user_id} expired and has no refresh token")]
    TokenExpiredNoRefresh { user_id: String },

    #[error("upstream refresh failed for user {user_id}: {reason}")]
    UpstreamRefreshFailed { user_id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
