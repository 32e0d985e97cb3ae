use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use occ_prompts::Template;
use occ_users::{RateLimitTier, RateLimits};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{self, AuthenticatedCaller};

type JsonErr = (StatusCode, Json<Value>);
type AdminResult<T> = Result<Json<T>, JsonErr>;

/// Admin Control Plane HTTP surface (§4.N): runtime config, allow-lists,
/// access requests, and prompt-template CRUD. Every handler requires an
/// admin identity and records an audit entry on write.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/config", get(list_config))
        .route("/admin/config/{key}", put(set_config))
        .route("/admin/users/{user_id}/allow", post(allow_user).delete(disallow_user))
        .route("/admin/users/{user_id}/admin", put(set_user_admin))
        .route("/admin/users/{user_id}/api-keys", post(issue_api_key))
        .route("/admin/domains/{domain}/allow", post(allow_domain))
        .route("/admin/access-requests", get(list_access_requests))
        .route("/admin/access-requests/{id}/decide", post(decide_access_request))
        .route("/admin/templates", get(list_templates).post(create_template))
        .route("/admin/templates/{id}", put(update_template).delete(delete_template))
}

async fn require_admin(state: &Arc<AppState>, headers: &HeaderMap) -> Result<AuthenticatedCaller, JsonErr> {
    let caller = auth::authenticate(state, headers).await?;
    auth::require_admin(&caller)?;
    Ok(caller)
}

fn audit(state: &Arc<AppState>, admin_user_id: &str, action: &str, target: Option<&str>, details: Value) {
    if let Err(e) = state.audit.record_admin_action(admin_user_id, action, target, details) {
        tracing::error!(error = %e, action, "failed to record admin audit entry");
    }
}

fn internal(e: impl std::fmt::Display) -> JsonErr {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"message": e.to_string(), "type": "internal"}})))
}

#[derive(Deserialize)]
struct ConfigValue {
    value: String,
}

async fn list_config(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AdminResult<Value> {
    require_admin(&state, &headers).await?;
    let entries = state.admin.list_runtime_config().map_err(internal)?;
    Ok(Json(json!({"config": entries.into_iter().collect::<std::collections::BTreeMap<_, _>>()})))
}

async fn set_config(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(key): Path<String>, Json(body): Json<ConfigValue>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.admin.set_runtime_config(&key, &body.value).map_err(internal)?;
    audit(&state, &caller.user_id, "set_runtime_config", Some(&key), json!({"value": body.value}));
    Ok(Json(json!({"key": key})))
}

async fn allow_user(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(user_id): Path<String>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.admin.allow_user(&user_id).map_err(internal)?;
    audit(&state, &caller.user_id, "allow_user", Some(&user_id), json!({}));
    Ok(Json(json!({"user_id": user_id, "allowed": true})))
}

async fn disallow_user(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(user_id): Path<String>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.admin.disallow_user(&user_id).map_err(internal)?;
    audit(&state, &caller.user_id, "disallow_user", Some(&user_id), json!({}));
    Ok(Json(json!({"user_id": user_id, "allowed": false})))
}

#[derive(Deserialize)]
struct SetAdminBody {
    is_admin: bool,
}

async fn set_user_admin(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(user_id): Path<String>, Json(body): Json<SetAdminBody>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.users.set_admin(&user_id, body.is_admin).map_err(internal)?;
    audit(&state, &caller.user_id, "set_user_admin", Some(&user_id), json!({"is_admin": body.is_admin}));
    Ok(Json(json!({"user_id": user_id, "is_admin": body.is_admin})))
}

#[derive(Deserialize)]
struct IssueApiKeyBody {
    #[serde(default)]
    system: bool,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    custom_limits: Option<RateLimits>,
}

async fn issue_api_key(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(user_id): Path<String>, Json(body): Json<IssueApiKeyBody>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    let tier = match body.tier.as_deref() {
        Some("elevated") => RateLimitTier::Elevated,
        Some("system") => RateLimitTier::System,
        _ => RateLimitTier::Standard,
    };
    let (plaintext, record) = state.users.issue_api_key(&user_id, body.system, tier, body.custom_limits).map_err(internal)?;
    audit(&state, &caller.user_id, "issue_api_key", Some(&user_id), json!({"key_id": record.id, "prefix": record.prefix}));
    // Plaintext is returned exactly once (§6 "API-key format") — never logged, never persisted.
    Ok(Json(json!({"key": plaintext, "record": record})))
}

async fn allow_domain(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(domain): Path<String>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.admin.allow_domain(&domain).map_err(internal)?;
    audit(&state, &caller.user_id, "allow_domain", Some(&domain), json!({}));
    Ok(Json(json!({"domain": domain, "allowed": true})))
}

async fn list_access_requests(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AdminResult<Value> {
    require_admin(&state, &headers).await?;
    let requests = state.admin.list_pending_requests().map_err(internal)?;
    Ok(Json(json!({"requests": requests})))
}

#[derive(Deserialize)]
struct DecideRequestBody {
    approve: bool,
}

async fn decide_access_request(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>, Json(body): Json<DecideRequestBody>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.admin.decide_request(&id, body.approve, &caller.user_id).map_err(internal)?;
    audit(&state, &caller.user_id, "decide_access_request", Some(&id), json!({"approve": body.approve}));
    Ok(Json(json!({"id": id, "approve": body.approve})))
}

async fn list_templates(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AdminResult<Value> {
    require_admin(&state, &headers).await?;
    let templates = state.prompts.list().map_err(internal)?;
    Ok(Json(json!({"templates": templates})))
}

async fn create_template(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(template): Json<Template>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.prompts.create(&template).map_err(internal)?;
    audit(&state, &caller.user_id, "create_template", Some(&template.id), json!({"name": template.name}));
    Ok(Json(json!({"template": template})))
}

async fn update_template(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>, Json(mut template): Json<Template>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    template.id = id;
    state.prompts.update(&template).map_err(internal)?;
    audit(&state, &caller.user_id, "update_template", Some(&template.id), json!({"name": template.name}));
    Ok(Json(json!({"template": template})))
}

async fn delete_template(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<String>) -> AdminResult<Value> {
    let caller = require_admin(&state, &headers).await?;
    state.prompts.delete(&id).map_err(internal)?;
    audit(&state, &caller.user_id, "delete_template", Some(&id), json!({}));
    Ok(Json(json!({"id": id, "deleted": true})))
}
