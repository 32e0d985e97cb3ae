use std::sync::Arc;

use async_trait::async_trait;
use occ_sessions::SessionManager;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::events::PipelineEvent;
use crate::stage::{priority, Stage};

/// Persists the turn's terminating assistant message — the one with no
/// `tool_calls`, reached after the tool-calling loop breaks (§4.J priority
/// 70). Every completed tool round already persisted itself; this stage's
/// own commit is the only one `rollback` needs to undo.
pub struct PersistenceStage {
    sessions: Arc<SessionManager>,
}

impl PersistenceStage {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl Stage for PersistenceStage {
    fn name(&self) -> &'static str {
        "persistence"
    }

    fn priority(&self) -> u32 {
        priority::PERSISTENCE
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        let Some(message) = ctx.final_assistant.clone() else {
            return Ok(());
        };

        self.sessions.append_message(&message)?;
        ctx.persisted_message_ids.push(message.id.clone());
        ctx.events.emit(PipelineEvent::MessagePersisted { message_id: message.id, role: "assistant" });
        Ok(())
    }

    /// Undoes this stage's own commit only — a later abort must not also
    /// delete the already-durable tool rounds from earlier in the turn
    /// (§4.J "rollback(ctx)").
    async fn rollback(&self, ctx: &mut PipelineContext) {
        if let Some(message) = &ctx.final_assistant {
            if let Err(e) = self.sessions.delete_message(&message.id) {
                tracing::error!(error = %e, message_id = %message.id, "rollback failed to delete assistant message");
            }
        }
    }
}
