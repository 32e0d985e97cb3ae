use thiserror::Error;

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("system prompt + reserve leave no room in a {context_window}-token window (reserved {reserved}, system {system_tokens})")]
    BudgetExceeded {
        context_window: u32,
        reserved: u32,
        system_tokens: u32,
    },
    #[error("invalid model config: context window must be positive, got {0}")]
    InvalidModelConfig(i64),
}

pub type Result<T> = std::result::Result<T, BudgetError>;
