use async_trait::async_trait;

use crate::error::CredentialError;
use crate::types::RefreshedToken;

/// Upstream OAuth2/OIDC identity provider used by the refresh-token grant
/// (§6 "Identity provider"). Implementations wrap whatever HTTP client the
/// deployment needs; tests substitute an in-memory double.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn refresh(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<RefreshedToken, CredentialError>;
}

/// Minimal OAuth2 refresh-token-grant client over `reqwest`.
pub struct OAuthIdentityProvider {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

impl OAuthIdentityProvider {
    pub fn new(token_endpoint: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: i64,
    scope: Option<String>,
}

#[async_trait]
impl IdentityProvider for OAuthIdentityProvider {
    async fn refresh(
        &self,
        user_id: &str,
        refresh_token: &str,
    ) -> Result<RefreshedToken, CredentialError> {
        let resp = self
            .client
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CredentialError::UpstreamRefreshFailed {
                user_id: user_id.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(CredentialError::UpstreamRefreshFailed {
                user_id: user_id.to_string(),
                reason: format!("identity provider returned {}", resp.status()),
            });
        }

        let body: TokenResponse = resp.json().await.map_err(|e| {
            CredentialError::UpstreamRefreshFailed {
                user_id: user_id.to_string(),
                reason: format!("malformed token response: {e}"),
            }
        })?;

        Ok(RefreshedToken {
            access_token: body.access_token,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(body.expires_in),
            scope: body.scope.unwrap_or_default(),
        })
    }
}
