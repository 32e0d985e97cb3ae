use occ_core::types::TokenUsage;
use tokio::sync::mpsc;

/// Internal event vocabulary emitted during one turn (§4.K), upstream of the
/// gateway's own SSE `Event` encoding. Kept independent from the wire format
/// so the pipeline never depends on `axum`/SSE framing — `occ-gateway`
/// translates each variant into an `Event` with the matching `event:` name.
///
/// `connected`, `heartbeat`, and `job_completed` are not produced here: they
/// are properties of the transport/subscription, not of a single turn (§9
/// "iterators/generators: the SSE emitter is a finite, non-restartable
/// sequence of events — model as a channel/stream handle with an explicit
/// close").
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Delta { content: String },
    ToolCallStarted { id: String, name: String },
    ToolCallCompleted { id: String, name: String, is_error: bool },
    MessagePersisted { message_id: String, role: &'static str },
    Usage(TokenUsage),
}

/// A turn's event sink. Cloneable and cheap; emitting with no subscriber
/// attached is a no-op rather than an error, so stages never need to check
/// whether anyone is listening (e.g. a non-streaming HTTP caller).
#[derive(Clone, Default)]
pub struct PipelineEvents {
    sender: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl PipelineEvents {
    pub fn new(sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        Self { sender: Some(sender) }
    }

    /// No-op sink, for callers (tests, non-streaming paths) that don't need
    /// incremental events.
    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.sender {
            // The receiver may already be gone if the client disconnected;
            // that is not a pipeline error.
            let _ = sender.send(event);
        }
    }
}
