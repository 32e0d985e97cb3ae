use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel refresh-token value marking a service-principal credential.
/// Records carrying this value skip signature validation and are never
/// refreshed (§4.A).
pub const SERVICE_PRINCIPAL_SENTINEL: &str = "service_principal";

/// One delegated credential per user (§3 `Credential Record`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
    pub tenant_id: Option<String>,
}

impl CredentialRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_service_principal(&self) -> bool {
        self.refresh_token.as_deref() == Some(SERVICE_PRINCIPAL_SENTINEL)
    }
}

/// Result of a successful upstream refresh call.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub id_token: Option<String>,
    /// `None` when the provider did not rotate the refresh token — the
    /// caller keeps the prior value.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}
