use std::sync::Arc;

use dashmap::DashMap;
use occ_audit::AuditRecorder;
use occ_blob::BlobStore;
use occ_core::config::OrchestrationConfig;
use occ_credentials::CredentialStore;
use occ_jobs::JobWatcher;
use occ_pipeline::{CompletionProvider, OrchestrationPipeline};
use occ_prompts::PromptTemplateRouter;
use occ_retrieval::RetrievalOrchestrator;
use occ_sessions::SessionManager;
use occ_tools::ToolRegistry;
use occ_users::{AdminControlPlane, UserManager};
use tokio_util::sync::CancellationToken;

use crate::rate_limit::RateLimiter;

/// Central shared state handed to every Axum handler as `Arc<AppState>`
/// (§4.J "one pipeline instance serves one turn"): one struct holding every
/// subsystem plus the `DashMap`s tracking live connections and in-flight
/// operations. The streaming path clones this `Arc` into its spawned task
/// rather than reaching for any `'static`-lifetime workaround.
pub struct AppState {
    pub config: OrchestrationConfig,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserManager>,
    pub admin: Arc<AdminControlPlane>,
    pub credentials: Arc<CredentialStore>,
    pub prompts: Arc<PromptTemplateRouter>,
    pub retrieval: Arc<RetrievalOrchestrator>,
    pub memory: Arc<occ_memory::MemoryManager>,
    pub tools: Arc<ToolRegistry>,
    pub blob: Arc<BlobStore>,
    pub provider: Arc<dyn CompletionProvider>,
    pub audit: Arc<AuditRecorder>,
    pub jobs: Arc<JobWatcher>,
    /// One pipeline instance serves one turn; distinct turns each get their
    /// own `PipelineContext` but share this same stage wiring (§4.J).
    pub pipeline: Arc<OrchestrationPipeline>,
    pub rate_limiter: RateLimiter,
    /// Active turns: session-id -> cancellation token, so `/turns/{id}/cancel`
    /// (and client disconnect) can abort an in-flight pipeline run (§4.K,
    /// §5 "cancellation is cooperative").
    pub active_turns: DashMap<String, CancellationToken>,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: OrchestrationConfig,
        sessions: Arc<SessionManager>,
        users: Arc<UserManager>,
        admin: Arc<AdminControlPlane>,
        credentials: Arc<CredentialStore>,
        prompts: Arc<PromptTemplateRouter>,
        retrieval: Arc<RetrievalOrchestrator>,
        memory: Arc<occ_memory::MemoryManager>,
        tools: Arc<ToolRegistry>,
        blob: Arc<BlobStore>,
        provider: Arc<dyn CompletionProvider>,
        audit: Arc<AuditRecorder>,
        jobs: Arc<JobWatcher>,
        pipeline: Arc<OrchestrationPipeline>,
    ) -> Self {
        Self {
            config,
            sessions,
            users,
            admin,
            credentials,
            prompts,
            retrieval,
            memory,
            tools,
            blob,
            provider,
            audit,
            jobs,
            pipeline,
            rate_limiter: RateLimiter::new(),
            active_turns: DashMap::new(),
        }
    }

    pub fn pipeline_limits(&self) -> occ_pipeline::types::PipelineLimits {
        occ_pipeline::types::PipelineLimits {
            max_tool_calls_per_turn: self.config.pipeline.max_tool_calls_per_turn.unwrap_or(40),
            max_tool_rounds: self.config.pipeline.max_tool_rounds,
            per_tool_timeout: std::time::Duration::from_secs(self.config.pipeline.per_tool_timeout_secs),
            overall_turn_timeout: std::time::Duration::from_secs(self.config.pipeline.overall_turn_timeout_secs),
        }
    }

    pub fn budget_model_config(&self) -> occ_budget::ModelConfig {
        occ_budget::ModelConfig {
            context_window: 128_000,
            response_reserve: self.config.budget.response_reserve,
            min_response_tokens: self.config.budget.min_response_tokens,
            max_system_tokens: self.config.budget.max_system_tokens,
        }
    }

    pub fn budget_tier_ratios(&self) -> occ_budget::TierRatios {
        occ_budget::TierRatios {
            tier1: self.config.budget.tier1_ratio,
            tier2: self.config.budget.tier2_ratio,
            tier3: self.config.budget.tier3_ratio,
        }
    }
}

/// Assembles the full Axum router (§6 "Inbound turn endpoint").
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .merge(crate::http::health::router())
        .merge(crate::http::turn::router())
        .merge(crate::http::admin::router())
        .merge(crate::http::blobs::router())
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
