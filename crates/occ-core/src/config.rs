use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (`occ.toml` + `OCC_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub backends: BackendConfig,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            budget: BudgetConfig::default(),
            pipeline: PipelineConfig::default(),
            transport: TransportConfig::default(),
            backends: BackendConfig::default(),
        }
    }
}

impl OrchestrationConfig {
    /// Load config from a TOML file with `OCC_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.occ/occ.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: OrchestrationConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("OCC_").split("__"))
            .extract()
            .map_err(|e| crate::error::OrchestrationError::Internal(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.occ/occ.toml", home)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    8780
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.occ/occ.db", home)
}

/// Context Budget Manager configuration — §4.E / §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_response_reserve")]
    pub response_reserve: f64,
    #[serde(default = "default_min_response_tokens")]
    pub min_response_tokens: u32,
    #[serde(default = "default_max_system_tokens")]
    pub max_system_tokens: u32,
    #[serde(default = "default_tier1_ratio")]
    pub tier1_ratio: f64,
    #[serde(default = "default_tier2_ratio")]
    pub tier2_ratio: f64,
    #[serde(default = "default_tier3_ratio")]
    pub tier3_ratio: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            response_reserve: default_response_reserve(),
            min_response_tokens: default_min_response_tokens(),
            max_system_tokens: default_max_system_tokens(),
            tier1_ratio: default_tier1_ratio(),
            tier2_ratio: default_tier2_ratio(),
            tier3_ratio: default_tier3_ratio(),
        }
    }
}

fn default_response_reserve() -> f64 {
    0.2
}
fn default_min_response_tokens() -> u32 {
    512
}
fn default_max_system_tokens() -> u32 {
    2000
}
fn default_tier1_ratio() -> f64 {
    0.5
}
fn default_tier2_ratio() -> f64 {
    0.3
}
fn default_tier3_ratio() -> f64 {
    0.2
}

/// Orchestration Pipeline configuration — §4.J / §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default)]
    pub max_tool_calls_per_turn: Option<u32>,
    #[serde(default = "default_per_tool_timeout_secs")]
    pub per_tool_timeout_secs: u64,
    #[serde(default = "default_overall_turn_timeout_secs")]
    pub overall_turn_timeout_secs: u64,
    /// §9 Open Question: completed-cycle collapse. Disabled by default.
    #[serde(default)]
    pub experimental_cycle_collapse: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_tool_calls_per_turn: None,
            per_tool_timeout_secs: default_per_tool_timeout_secs(),
            overall_turn_timeout_secs: default_overall_turn_timeout_secs(),
            experimental_cycle_collapse: false,
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    5
}
fn default_per_tool_timeout_secs() -> u64 {
    30
}
fn default_overall_turn_timeout_secs() -> u64 {
    120
}

/// SSE Transport + Background Job Watcher cadence — §4.K / §4.L / §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_job_poll_interval_ms")]
    pub job_poll_interval_ms: u64,
    #[serde(default = "default_sse_job_forward_interval_ms")]
    pub sse_job_forward_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            job_poll_interval_ms: default_job_poll_interval_ms(),
            sse_job_forward_interval_ms: default_sse_job_forward_interval_ms(),
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    15_000
}
fn default_job_poll_interval_ms() -> u64 {
    5_000
}
fn default_sse_job_forward_interval_ms() -> u64 {
    2_000
}

/// Backend selectors (§6): which concrete blob/vector/identity backend to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Explicit blob backend selector (`"s3"` or `"local"`). `None` falls
    /// back to credential-based auto-detection, then local filesystem (§6).
    pub blob_storage_type: Option<String>,
    /// S3-compatible (or cloud object-storage) endpoint for the blob
    /// facade. Its mere presence is the "provider's credentials" signal
    /// §6 uses to auto-select the backend when `blob_storage_type` is unset.
    #[serde(default)]
    pub blob_s3_endpoint: Option<String>,
    #[serde(default)]
    pub blob_s3_auth_header: Option<String>,
    #[serde(default)]
    pub blob_s3_auth_token: Option<String>,
    /// Root directory for the local filesystem blob backend, used when no
    /// other backend is selected.
    #[serde(default = "default_blob_local_root")]
    pub blob_local_root: String,
    pub vector_backend_endpoint: Option<String>,
    pub identity_tenant_id: Option<String>,

    /// Upstream OpenAI-compatible completion/embedding provider (§6
    /// "Upstream model provider").
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Refresh-token-grant OAuth client used by the credential store (§4.A)
    /// to refresh delegated user tokens.
    #[serde(default)]
    pub oauth_token_endpoint: Option<String>,
    #[serde(default)]
    pub oauth_client_id: String,
    #[serde(default)]
    pub oauth_client_secret: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            blob_storage_type: None,
            blob_s3_endpoint: None,
            blob_s3_auth_header: None,
            blob_s3_auth_token: None,
            blob_local_root: default_blob_local_root(),
            vector_backend_endpoint: None,
            identity_tenant_id: None,
            llm_base_url: default_llm_base_url(),
            llm_api_key: String::new(),
            llm_model: default_llm_model(),
            embedding_model: default_embedding_model(),
            oauth_token_endpoint: None,
            oauth_client_id: String::new(),
            oauth_client_secret: String::new(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_blob_local_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.occ/blobs", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_scenario_4_defaults_match_spec() {
        // §8 scenario 4 literals.
        let cfg = BudgetConfig::default();
        assert_eq!(cfg.response_reserve, 0.2); // overridden to 0.25 in the test call
        assert_eq!(cfg.min_response_tokens, 512);
        assert_eq!(cfg.max_system_tokens, 2000);
    }
}
