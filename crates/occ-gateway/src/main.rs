use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use occ_blob::BlobStore;
use occ_core::config::OrchestrationConfig;
use occ_credentials::provider::OAuthIdentityProvider;
use occ_credentials::{CredentialStore, IdentityProvider};
use occ_pipeline::stages::{
    budget::BudgetStage, completion::CompletionStage, message_preparation::MessagePreparationStage, persistence::PersistenceStage,
    prompt_routing::PromptRoutingStage, retrieval::RetrievalStage, session_load::SessionLoadStage, tool_execution::ToolExecutionStage,
    usage_record::UsageRecordStage,
};
use occ_pipeline::OrchestrationPipeline;
use occ_prompts::{PromptTemplateRouter, TemplateRepository};
use occ_retrieval::RetrievalOrchestrator;
use occ_sessions::SessionManager;
use occ_tools::ToolRegistry;
use occ_users::{AdminControlPlane, UserManager};
use occ_vector::VectorGateway;
use rusqlite::Connection;
use tracing::info;

mod app;
mod auth;
mod http;
mod provider;
mod rate_limit;

use app::AppState;
use provider::{HttpEmbedder, OpenAiCompletionProvider};

const HISTORY_LIMIT: usize = 200;
const WATCH_SET_CAP: usize = 1000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "occ_gateway=info,tower_http=info".into()))
        .init();

    let config_path = std::env::var("OCC_CONFIG").ok();
    let config = OrchestrationConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, using defaults");
        OrchestrationConfig::default()
    });

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let sessions = Arc::new(SessionManager::new(open_db(&config)?)?);
    let users = Arc::new(UserManager::new(open_db(&config)?)?);
    let admin = Arc::new(AdminControlPlane::new(open_db(&config)?)?);

    let identity_provider: Arc<dyn IdentityProvider> = Arc::new(OAuthIdentityProvider::new(
        config.backends.oauth_token_endpoint.clone().unwrap_or_default(),
        config.backends.oauth_client_id.clone(),
        config.backends.oauth_client_secret.clone(),
    ));
    let credentials = Arc::new(CredentialStore::new(open_db(&config)?, identity_provider)?);

    let prompt_vectors = VectorGateway::new(open_db(&config)?)?;
    let prompt_embedder = Box::new(HttpEmbedder::new(
        config.backends.llm_api_key.clone(),
        config.backends.llm_base_url.clone(),
        config.backends.embedding_model.clone(),
    ));
    let template_repo = TemplateRepository::new(open_db(&config)?)?;
    let prompts = Arc::new(PromptTemplateRouter::new(prompt_vectors, prompt_embedder, template_repo));

    let retrieval_vectors = VectorGateway::new(open_db(&config)?)?;
    let retrieval_embedder = Box::new(HttpEmbedder::new(
        config.backends.llm_api_key.clone(),
        config.backends.llm_base_url.clone(),
        config.backends.embedding_model.clone(),
    ));
    let retrieval = Arc::new(RetrievalOrchestrator::new(retrieval_vectors, retrieval_embedder, open_db(&config)?)?);

    let memory = Arc::new(occ_memory::MemoryManager::new(open_db(&config)?)?);
    let tools = Arc::new(ToolRegistry::with_builtin_catalogue());
    let blob = Arc::new(BlobStore::from_config(&config.backends));
    let provider = Arc::new(OpenAiCompletionProvider::new(
        config.backends.llm_api_key.clone(),
        config.backends.llm_base_url.clone(),
        config.backends.llm_model.clone(),
    ));
    let audit = Arc::new(occ_audit::AuditRecorder::new(open_db(&config)?)?);

    let job_store = occ_jobs::JobStore::new(open_db(&config)?)?;
    let jobs = Arc::new(occ_jobs::JobWatcher::new(job_store, Duration::from_millis(config.transport.job_poll_interval_ms), WATCH_SET_CAP));

    let working_dir = std::env::current_dir()?;
    let pipeline = Arc::new(OrchestrationPipeline::new(
        Arc::new(SessionLoadStage::new(sessions.clone(), HISTORY_LIMIT)),
        Arc::new(PromptRoutingStage::new(prompts.clone())),
        Arc::new(RetrievalStage::new(retrieval.clone(), memory.clone())),
        Arc::new(BudgetStage::new(
            occ_budget::ModelConfig {
                context_window: 128_000,
                response_reserve: config.budget.response_reserve,
                min_response_tokens: config.budget.min_response_tokens,
                max_system_tokens: config.budget.max_system_tokens,
            },
            occ_budget::TierRatios { tier1: config.budget.tier1_ratio, tier2: config.budget.tier2_ratio, tier3: config.budget.tier3_ratio },
        )),
        Arc::new(MessagePreparationStage),
        Arc::new(CompletionStage::new(provider.clone(), tools.clone())),
        Arc::new(ToolExecutionStage::new(tools.clone(), sessions.clone(), working_dir)),
        Arc::new(PersistenceStage::new(sessions.clone())),
        Arc::new(UsageRecordStage::new(audit.clone())),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(Arc::clone(&jobs).run(shutdown_rx));

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(AppState::new(
        config, sessions, users, admin, credentials, prompts, retrieval, memory, tools, blob, provider, audit, jobs, pipeline,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!(%addr, "occ-gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, router);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}

fn open_db(config: &OrchestrationConfig) -> anyhow::Result<Connection> {
    Ok(Connection::open(&config.database.path)?)
}
