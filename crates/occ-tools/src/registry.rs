use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::{Result, ToolError};
use crate::types::{InvocationContext, ToolDefinition, ToolOutput};

/// A single registered tool (§4.H / §9 "dynamic objects → tagged variants":
/// arguments are a `serde_json::Value` validated against `input_schema` by
/// each implementation at the boundary, rather than an open-ended dict
/// threaded through untyped).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool. Implementations must poll `ctx.cancellation` at
    /// sensible boundaries (e.g. before/after each I/O await) and return
    /// promptly once it fires.
    async fn execute(&self, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput;
}

/// Exposes tool schemas and dispatches execution by name (§4.H contract).
///
/// Tools registered here include the built-in catalogue plus any
/// domain-specific tools registered dynamically at startup or per-tenant.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The built-in catalogue required by §4.H: read multiple files, apply
    /// unified-diff patch, web search, web fetch.
    pub fn with_builtin_catalogue() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::tools::read_many_files::ReadManyFilesTool));
        registry.register(Box::new(crate::tools::patch_file::PatchFileTool));
        registry.register(Box::new(crate::tools::web_search::WebSearchTool::default()));
        registry.register(Box::new(crate::tools::web_fetch::WebFetchTool::default()));
        registry
    }

    /// Registers a tool, including domain tools added dynamically after
    /// startup. Re-registering a name replaces the prior entry.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        if let Some(existing) = self.tools.iter().position(|t| t.name() == tool.name()) {
            self.tools[existing] = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    #[instrument(skip(self, args, ctx), fields(tool = %name))]
    pub async fn execute(&self, name: &str, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            warn!(tool = name, "execute called against unknown tool");
            return ToolOutput::error(format!("unknown tool: {name}"));
        };

        if ctx.cancellation.is_cancelled() {
            return ToolOutput::error("cancelled before execution started");
        }

        debug!(tool = name, "executing tool");
        tokio::select! {
            output = tool.execute(args, ctx) => output,
            _ = ctx.cancellation.cancelled() => ToolOutput::error(format!("tool '{name}' cancelled")),
        }
    }

    /// Lookup only, for callers that want to validate a tool name exists
    /// without running it (e.g. the pipeline's tool_calls validation).
    pub fn get(&self, name: &str) -> Result<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtin_catalogue()
    }
}
