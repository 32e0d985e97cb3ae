use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use occ_users::{RateLimitTier, RateLimits};
use serde_json::json;

use crate::app::AppState;

/// Resolved caller identity for one request (§6 "Inbound turn endpoint").
pub struct AuthenticatedCaller {
    pub user_id: String,
    pub groups: Vec<String>,
    pub is_admin: bool,
    pub rate_limit_tier: RateLimitTier,
    pub rate_limits: Option<RateLimits>,
}

/// Authenticates a request against either a bearer delegated access token
/// (§4.A credential store) or an issued API key (§6 "API-key format").
/// `awc_` / `awc_system_` keys are hashed at rest and verified via
/// `occ_users::UserManager::verify_api_key`; a bearer token is checked
/// against the credential store's own expiry, never refreshed here — a turn
/// whose token is expired fails with `auth_required` rather than silently
/// refreshing mid-request, keeping refresh exclusively single-flight inside
/// `occ-credentials` (§4.A, P4).
pub async fn authenticate(state: &Arc<AppState>, headers: &HeaderMap) -> Result<AuthenticatedCaller, (StatusCode, Json<serde_json::Value>)> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing authorization header"))?;

    let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header).trim();

    if token.starts_with("awc_") {
        let record = state.users.verify_api_key(token).map_err(|_| unauthorized("invalid or revoked API key"))?;
        let user = state.users.create_or_get(&record.user_id).map_err(internal_error)?;
        return Ok(AuthenticatedCaller {
            user_id: user.id,
            groups: user.groups,
            is_admin: user.is_admin,
            rate_limit_tier: record.tier,
            rate_limits: record.custom_limits,
        });
    }

    // Otherwise treat the bearer value as a delegated user id whose access
    // token is already on file in the credential store (§4.A `Get`).
    let (record, expired) = state.credentials.get(token).map_err(|_| auth_required("no credential record for this token"))?;
    if expired {
        return Err(auth_required("delegated token expired; client must re-authenticate"));
    }
    let user = state.users.create_or_get(&record.user_id).map_err(internal_error)?;
    Ok(AuthenticatedCaller { user_id: user.id, groups: user.groups, is_admin: user.is_admin, rate_limit_tier: RateLimitTier::Standard, rate_limits: None })
}

pub fn require_admin(caller: &AuthenticatedCaller) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    if caller.is_admin {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, Json(json!({"error": {"message": "admin identity required", "type": "auth_required"}}))))
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": message, "type": "auth_required"}})))
}

fn auth_required(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": message, "type": "auth_required"}})))
}

fn internal_error<E: std::fmt::Display>(e: E) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"message": e.to_string(), "type": "internal"}})))
}
