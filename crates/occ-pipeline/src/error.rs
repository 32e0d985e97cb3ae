use thiserror::Error;

/// Failure taxonomy surfaced by the pipeline (§4.J), layered directly on top
/// of the shared §7 taxonomy so callers branch on one `kind()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] occ_core::OrchestrationError),

    #[error(transparent)]
    Session(#[from] occ_sessions::SessionError),

    #[error(transparent)]
    Memory(#[from] occ_memory::MemoryError),

    #[error(transparent)]
    Budget(#[from] occ_budget::BudgetError),

    #[error(transparent)]
    Retrieval(#[from] occ_retrieval::RetrievalError),

    #[error(transparent)]
    Prompt(#[from] occ_prompts::PromptError),

    #[error(transparent)]
    Credential(#[from] occ_credentials::CredentialError),

    #[error("overall turn timeout exceeded")]
    TurnTimeout,

    #[error("maximum tool rounds ({0}) exceeded")]
    MaxToolRoundsExceeded(u32),

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(e) => e.kind(),
            Self::Session(_) | Self::Memory(_) | Self::Retrieval(_) | Self::Prompt(_) => "internal",
            Self::Budget(_) => "budget_exceeded",
            Self::Credential(_) => "auth_required",
            Self::TurnTimeout => "internal",
            Self::MaxToolRoundsExceeded(_) => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
