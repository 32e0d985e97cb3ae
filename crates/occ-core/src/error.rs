use thiserror::Error;

/// Error taxonomy surfaced to clients (§7).
///
/// Every terminal SSE `error` event and every non-streaming HTTP error
/// response carries one of these kinds so client-side handling can branch
/// on `kind()` without parsing message text.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("context budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream schema violation: {0}")]
    SchemaViolation(String),

    #[error("tool '{name}' timed out after {timeout_ms}ms")]
    ToolTimeout { name: String, timeout_ms: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// Short error kind string sent to clients in terminal SSE `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired(_) => "auth_required",
            Self::RateLimited { .. } => "rate_limited",
            Self::BudgetExceeded(_) => "budget_exceeded",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::SchemaViolation(_) => "schema_violation",
            Self::ToolTimeout { .. } => "tool_timeout",
            Self::Cancelled => "cancelled",
            Self::Database(_) => "internal",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
