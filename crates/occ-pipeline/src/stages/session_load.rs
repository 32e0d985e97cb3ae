use std::sync::Arc;

use async_trait::async_trait;
use occ_sessions::SessionManager;

use crate::context::PipelineContext;
use crate::error::Result;
use crate::stage::{priority, Stage};

/// Loads the session's persisted history into the shared context (§4.J
/// priority 10). Commits nothing, so `rollback` is the default no-op.
pub struct SessionLoadStage {
    sessions: Arc<SessionManager>,
    history_limit: usize,
}

impl SessionLoadStage {
    pub fn new(sessions: Arc<SessionManager>, history_limit: usize) -> Self {
        Self { sessions, history_limit }
    }
}

#[async_trait]
impl Stage for SessionLoadStage {
    fn name(&self) -> &'static str {
        "session-load"
    }

    fn priority(&self) -> u32 {
        priority::SESSION_LOAD
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<()> {
        ctx.history = self.sessions.history(&ctx.session_id, self.history_limit)?;
        Ok(())
    }
}
