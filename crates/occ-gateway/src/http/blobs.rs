use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::app::AppState;
use crate::auth;

/// Blob Store Facade HTTP surface (§4.C): upload/fetch/delete by key.
/// Attachments on a `Message` only ever carry a key (§3 "referenced by
/// Message attachments by key, never by value"); this is where that key is
/// minted and where its bytes live.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/blobs", post(upload_blob))
        .route("/v1/blobs/{key}", get(get_blob).delete(delete_blob))
}

async fn upload_blob(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let caller = auth::authenticate(&state, &headers).await?;
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let metadata = state
        .blob
        .store_new(&caller.user_id, "upload", body.to_vec(), &content_type)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"message": e.to_string(), "type": "internal"}}))))?;

    Ok(Json(json!({
        "key": metadata.key,
        "size": metadata.size,
        "content_type": metadata.content_type,
    })))
}

async fn get_blob(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Bytes, (StatusCode, Json<serde_json::Value>)> {
    auth::authenticate(&state, &headers).await?;

    let bytes = state
        .blob
        .get(&key)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"message": e.to_string(), "type": "internal"}}))))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": {"message": "blob not found", "type": "internal"}}))))?;

    Ok(Bytes::from(bytes))
}

async fn delete_blob(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    auth::authenticate(&state, &headers).await?;

    let deleted = state
        .blob
        .delete(&key)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"message": e.to_string(), "type": "internal"}}))))?;

    Ok(Json(json!({"deleted": deleted})))
}
