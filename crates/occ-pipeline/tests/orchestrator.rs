use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use occ_audit::AuditRecorder;
use occ_core::types::{Message, ToolCall};
use occ_pipeline::context::PipelineContext;
use occ_pipeline::error::Result as PipelineResult;
use occ_pipeline::events::PipelineEvents;
use occ_pipeline::provider::CompletionProvider;
use occ_pipeline::stage::Stage;
use occ_pipeline::stages::{MessagePreparationStage, PersistenceStage, ToolExecutionStage, UsageRecordStage};
use occ_pipeline::types::{CompletionRequest, CompletionResult, PipelineLimits};
use occ_pipeline::OrchestrationPipeline;
use occ_sessions::SessionManager;
use occ_tools::{InvocationContext, Tool, ToolOutput, ToolRegistry};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

/// No-op stand-in for the setup stages (session-load/prompt-routing/
/// retrieval/budget) this test doesn't need real backends for.
struct NoopStage(&'static str, u32);

#[async_trait]
impl Stage for NoopStage {
    fn name(&self) -> &'static str {
        self.0
    }
    fn priority(&self) -> u32 {
        self.1
    }
    async fn execute(&self, _ctx: &mut PipelineContext) -> PipelineResult<()> {
        Ok(())
    }
}

/// Answers with a fixed tool call the first N times, then a plain final
/// message — lets tests drive the loop through exactly one or more rounds.
struct ScriptedProvider {
    rounds_with_tool_call: u32,
    calls_made: AtomicU32,
}

impl ScriptedProvider {
    fn new(rounds_with_tool_call: u32) -> Self {
        Self { rounds_with_tool_call, calls_made: AtomicU32::new(0) }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, _request: CompletionRequest) -> PipelineResult<CompletionResult> {
        let call_index = self.calls_made.fetch_add(1, Ordering::SeqCst);
        if call_index < self.rounds_with_tool_call {
            Ok(CompletionResult {
                content: String::new(),
                tool_calls: vec![ToolCall { id: format!("call-{call_index}"), name: "echo".to_string(), arguments: serde_json::json!({"text": "hi"}) }],
                tokens_in: 10,
                tokens_out: 5,
            })
        } else {
            Ok(CompletionResult { content: "all done".to_string(), tool_calls: Vec::new(), tokens_in: 8, tokens_out: 12 })
        }
    }
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echoes its input back"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, args: serde_json::Value, _ctx: &InvocationContext) -> ToolOutput {
        ToolOutput::success(args.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string())
    }
}

fn build_pipeline(sessions: Arc<SessionManager>, audit: Arc<AuditRecorder>, tools: Arc<ToolRegistry>, provider: Arc<dyn CompletionProvider>) -> OrchestrationPipeline {
    OrchestrationPipeline::new(
        Arc::new(NoopStage("session-load", 10)),
        Arc::new(NoopStage("prompt-routing", 20)),
        Arc::new(NoopStage("retrieval", 30)),
        Arc::new(NoopStage("budget", 40)),
        Arc::new(MessagePreparationStage),
        Arc::new(occ_pipeline::stages::CompletionStage::new(provider, Arc::clone(&tools))),
        Arc::new(ToolExecutionStage::new(Arc::clone(&tools), Arc::clone(&sessions), std::env::temp_dir())),
        Arc::new(PersistenceStage::new(Arc::clone(&sessions))),
        Arc::new(UsageRecordStage::new(audit)),
    )
}

fn new_ctx(session_id: &str, user_id: &str) -> PipelineContext {
    let turn = Message::user(session_id, "turn-1", "please help", "2026-01-01T00:00:00Z");
    PipelineContext::new(session_id, user_id, vec!["default".to_string()], turn, PipelineLimits::default(), CancellationToken::new())
}

#[tokio::test]
async fn completes_without_any_tool_round() {
    let sessions = Arc::new(SessionManager::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap());
    let tools = Arc::new(ToolRegistry::new());
    let provider: Arc<dyn CompletionProvider> = Arc::new(ScriptedProvider::new(0));
    let pipeline = build_pipeline(Arc::clone(&sessions), audit, tools, provider);

    let mut ctx = new_ctx("s1", "u1");
    let result = pipeline.run_turn(&mut ctx).await.unwrap();

    assert_eq!(result.content, "all done");
    assert!(result.tool_calls.is_empty());
    // Only the final assistant message is persisted by the orchestrator
    // itself; the user's turn is the caller's responsibility to persist.
    let history = sessions.history("s1", 100).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "all done");
}

#[tokio::test]
async fn runs_one_tool_round_and_persists_it_before_the_final_reply() {
    let sessions = Arc::new(SessionManager::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap());
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    let tools = Arc::new(registry);
    let provider: Arc<dyn CompletionProvider> = Arc::new(ScriptedProvider::new(1));
    let pipeline = build_pipeline(Arc::clone(&sessions), audit, tools, provider);

    let mut ctx = new_ctx("s2", "u1");
    let result = pipeline.run_turn(&mut ctx).await.unwrap();

    assert_eq!(result.content, "all done");
    let history = sessions.history("s2", 100).unwrap();
    // assistant-with-tool-call, tool-response, final assistant text
    assert_eq!(history.len(), 3);
    assert!(!history[0].tool_calls.is_empty());
    assert_eq!(history[1].role, occ_core::types::Role::Tool);
    assert_eq!(history[1].content, "hi");
    assert_eq!(history[2].content, "all done");
    assert_eq!(ctx.tool_round, 1);
}

#[tokio::test]
async fn hitting_max_tool_rounds_ends_the_turn_with_a_capped_reply_instead_of_looping_forever() {
    let sessions = Arc::new(SessionManager::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap());
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    let tools = Arc::new(registry);
    // The provider would happily ask for a tool call forever; the limit
    // must stop the loop rather than the provider running dry.
    let provider: Arc<dyn CompletionProvider> = Arc::new(ScriptedProvider::new(1000));
    let pipeline = build_pipeline(Arc::clone(&sessions), audit, tools, provider);

    let mut ctx = new_ctx("s3", "u1");
    ctx.limits.max_tool_rounds = 2;
    let result = pipeline.run_turn(&mut ctx).await.unwrap();

    assert!(result.tool_calls.is_empty());
    assert!(result.content.contains("reached the limit"));
    assert_eq!(ctx.tool_round, 2);
    assert!(ctx.techniques.contains(&"cap:max_tool_rounds".to_string()));
}

#[tokio::test]
async fn cancelling_before_the_loop_starts_aborts_the_turn_without_persisting_anything() {
    let sessions = Arc::new(SessionManager::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap());
    let tools = Arc::new(ToolRegistry::new());
    let provider: Arc<dyn CompletionProvider> = Arc::new(ScriptedProvider::new(0));
    let pipeline = build_pipeline(Arc::clone(&sessions), audit, tools, provider);

    let mut ctx = new_ctx("s4", "u1");
    ctx.cancellation.cancel();
    let err = pipeline.run_turn(&mut ctx).await.unwrap_err();

    assert_eq!(err.kind(), "cancelled");
    assert!(sessions.history("s4", 100).unwrap().is_empty());
}

#[tokio::test]
async fn streaming_events_are_emitted_for_deltas_and_tool_lifecycle() {
    let sessions = Arc::new(SessionManager::new(Connection::open_in_memory().unwrap()).unwrap());
    let audit = Arc::new(AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap());
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool));
    let tools = Arc::new(registry);
    let provider: Arc<dyn CompletionProvider> = Arc::new(ScriptedProvider::new(1));
    let pipeline = build_pipeline(Arc::clone(&sessions), audit, tools, provider);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut ctx = new_ctx("s5", "u1").with_events(PipelineEvents::new(tx));
    pipeline.run_turn(&mut ctx).await.unwrap();
    drop(ctx);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.iter().any(|e| matches!(e, occ_pipeline::events::PipelineEvent::ToolCallStarted { .. })));
    assert!(events.iter().any(|e| matches!(e, occ_pipeline::events::PipelineEvent::ToolCallCompleted { is_error: false, .. })));
    assert!(events.iter().any(|e| matches!(e, occ_pipeline::events::PipelineEvent::Delta { content } if content == "all done")));
}
