use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use occ_core::types::{Attachment, Message};
use occ_pipeline::{PipelineContext, PipelineEvent, PipelineEvents};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::AppState;
use crate::auth;

/// Inbound turn endpoint (§4.K, §6 "Inbound turn endpoint"): accepts
/// `{sessionId?, message, attachments?, options?}` and returns
/// `text/event-stream`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/turns", post(create_turn))
}

#[derive(Debug, Deserialize)]
pub struct CreateTurnRequest {
    pub session_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Reserved for per-turn overrides (e.g. model selection); the pipeline
    /// does not yet interpret anything here.
    #[serde(default)]
    pub options: Option<serde_json::Value>,
}

pub async fn create_turn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTurnRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let caller = auth::authenticate(&state, &headers).await?;

    if !state.rate_limiter.check(&caller.user_id, caller.rate_limit_tier, caller.rate_limits) {
        return Err(error_response(StatusCode::TOO_MANY_REQUESTS, "rate_limited", "rate limit exceeded for this caller"));
    }

    let session = match &req.session_id {
        Some(id) => state
            .sessions
            .get(id)
            .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &e.to_string()))?
            .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "internal", "session not found"))?,
        None => state
            .sessions
            .create(&caller.user_id, None)
            .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &e.to_string()))?,
    };

    if session.user_id != caller.user_id {
        return Err(error_response(StatusCode::FORBIDDEN, "auth_required", "session belongs to another user"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let turn_id = uuid::Uuid::now_v7().to_string();
    let mut current_turn = Message::user(&session.id, turn_id, req.message.clone(), now);
    current_turn.attachments = req.attachments;

    // Persisted before the pipeline runs so the turn survives cancellation
    // or a crash mid-turn (§4.J "rollback", §9 cancellation invariant).
    state
        .sessions
        .append_message(&current_turn)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", &e.to_string()))?;

    let cancellation = CancellationToken::new();
    state.active_turns.insert(session.id.clone(), cancellation.clone());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = oneshot::channel();

    let pipeline_state = state.clone();
    let session_id = session.id.clone();
    let user_id = caller.user_id.clone();
    let user_groups = caller.groups.clone();
    let pipeline_cancellation = cancellation.clone();
    tokio::spawn(async move {
        let mut ctx = PipelineContext::new(
            session_id.clone(),
            user_id,
            user_groups,
            current_turn,
            pipeline_state.pipeline_limits(),
            pipeline_cancellation,
        )
        .with_events(PipelineEvents::new(event_tx));

        let outcome = pipeline_state.pipeline.run_turn(&mut ctx).await;
        pipeline_state.active_turns.remove(&session_id);
        let _ = result_tx.send(outcome);
    });

    let heartbeat_interval = Duration::from_millis(state.config.transport.heartbeat_interval_ms);
    let job_forward_interval = Duration::from_millis(state.config.transport.sse_job_forward_interval_ms);
    let jobs_rx = state.jobs.subscribe();
    let stream_session_id = session.id.clone();
    let stream_user_id = caller.user_id.clone();

    let stream = build_stream(stream_session_id, stream_user_id, cancellation, event_rx, result_rx, jobs_rx, heartbeat_interval, job_forward_interval);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat_interval)))
}

/// Cancels the pipeline run this stream is driving once the stream itself
/// is dropped — on client disconnect, on normal completion, on panic. This
/// is the one place releasing "all pollers, timers, and pipeline
/// cancellation tokens tied to this stream" (§4.K) actually happens, since
/// dropping the `async_stream::stream!` future runs every local's `Drop`.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[allow(clippy::too_many_arguments)]
fn build_stream(
    session_id: String,
    user_id: String,
    cancellation: CancellationToken,
    mut event_rx: mpsc::UnboundedReceiver<PipelineEvent>,
    result_rx: oneshot::Receiver<occ_pipeline::Result<Message>>,
    mut jobs_rx: tokio::sync::broadcast::Receiver<occ_jobs::JobStatusChange>,
    heartbeat_interval: Duration,
    job_forward_interval: Duration,
) -> impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        let _cancel_guard = CancelOnDrop(cancellation);

        yield Ok(Event::default().event("connected").data(json!({"session_id": session_id}).to_string()));

        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await;
        let mut job_poll = tokio::time::interval(job_forward_interval);
        job_poll.tick().await;

        let mut result_rx = result_rx;
        let mut pipeline_done = false;

        loop {
            tokio::select! {
                biased;

                event = event_rx.recv(), if !pipeline_done => {
                    if let Some(event) = event {
                        yield Ok(translate_event(event));
                    }
                }
                result = &mut result_rx, if !pipeline_done => {
                    pipeline_done = true;
                    yield Ok(terminal_event(result));
                    break;
                }
                _ = heartbeat.tick() => {
                    // `: heartbeat\n\n` sentinel (§4.K) — an SSE comment, not
                    // a named event, so clients parsing only `event:` lines
                    // never see it.
                    yield Ok(Event::default().comment("heartbeat"));
                }
                _ = job_poll.tick() => {
                    loop {
                        match jobs_rx.try_recv() {
                            Ok(change) => {
                                if change.session_id == session_id || change.user_id == user_id {
                                    yield Ok(Event::default().event("job_completed").data(
                                        serde_json::to_string(&change).unwrap_or_default(),
                                    ));
                                }
                            }
                            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(n)) => {
                                warn!(skipped = n, "SSE job forwarder lagged behind the watcher broadcast");
                                continue;
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
        }
    }
}

fn translate_event(event: PipelineEvent) -> Event {
    match event {
        PipelineEvent::Delta { content } => Event::default().event("delta").data(json!({"content": content}).to_string()),
        PipelineEvent::ToolCallStarted { id, name } => {
            Event::default().event("tool_call_started").data(json!({"id": id, "name": name}).to_string())
        }
        PipelineEvent::ToolCallCompleted { id, name, is_error } => {
            Event::default().event("tool_call_completed").data(json!({"id": id, "name": name, "is_error": is_error}).to_string())
        }
        PipelineEvent::MessagePersisted { message_id, role } => {
            Event::default().event("message_persisted").data(json!({"message_id": message_id, "role": role}).to_string())
        }
        PipelineEvent::Usage(usage) => {
            Event::default().event("usage").data(json!({"tokens_in": usage.tokens_in, "tokens_out": usage.tokens_out}).to_string())
        }
    }
}

fn terminal_event(result: Result<occ_pipeline::Result<Message>, oneshot::error::RecvError>) -> Event {
    match result {
        Ok(Ok(message)) => Event::default().event("done").data(serde_json::to_string(&message).unwrap_or_default()),
        Ok(Err(e)) => Event::default().event("error").data(json!({"error": {"message": e.to_string(), "type": e.kind()}}).to_string()),
        Err(_) => Event::default()
            .event("error")
            .data(json!({"error": {"message": "pipeline task ended without a result", "type": "internal"}}).to_string()),
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({"error": {"message": message, "type": kind}})))
}
