use serde::{Deserialize, Serialize};

/// Stable account record (§3 `User`). Never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitTier {
    Standard,
    Elevated,
    System,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RateLimits {
    pub per_minute: Option<u32>,
    pub per_hour: Option<u32>,
    pub burst: Option<u32>,
}

/// An issued API key. Only `id`/`user_id`/`prefix`/metadata are retained —
/// the plaintext is returned exactly once at creation and never stored
/// (§6 "API-key format").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: String,
    pub prefix: String,
    pub tier: RateLimitTier,
    pub custom_limits: Option<RateLimits>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: String,
    pub user_id: String,
    pub action_type: String,
    pub status: AccessRequestStatus,
    pub created_at: String,
    pub decided_at: Option<String>,
    pub decided_by: Option<String>,
}
