use serde::{Deserialize, Serialize};

/// How many items each context tier contributed, for usage reporting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub tier1: u32,
    pub tier2: u32,
    pub tier3: u32,
}

/// One record per assistant turn (§3 `Usage Record`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub templates_applied: Vec<String>,
    pub techniques: Vec<String>,
    pub tier_counts: TierCounts,
    pub injected_sources: Vec<String>,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub created_at: String,
}

/// One entry per admin action (§4.N).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAuditEntry {
    pub id: String,
    pub admin_user_id: String,
    pub action: String,
    pub target: Option<String>,
    pub details: serde_json::Value,
    pub created_at: String,
}
