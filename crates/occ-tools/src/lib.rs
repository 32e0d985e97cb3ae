pub mod error;
pub mod registry;
pub mod tools;
pub mod types;

pub use error::{Result, ToolError};
pub use registry::{Tool, ToolRegistry};
pub use types::{InvocationContext, ToolDefinition, ToolOutput};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn builtin_catalogue_lists_the_required_tools() {
        let registry = ToolRegistry::with_builtin_catalogue();
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        for required in ["read_many_files", "patch_file", "web_search", "web_fetch"] {
            assert!(names.contains(&required.to_string()), "missing {required}");
        }
    }

    #[tokio::test]
    async fn execute_against_unknown_tool_is_an_error_output_not_a_failure() {
        let registry = ToolRegistry::with_builtin_catalogue();
        let ctx = InvocationContext::new(".", "u1", Duration::from_secs(5));
        let out = registry.execute("does_not_exist", serde_json::json!({}), &ctx).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn cancellation_before_start_short_circuits() {
        let registry = ToolRegistry::with_builtin_catalogue();
        let ctx = InvocationContext::new(".", "u1", Duration::from_secs(5));
        ctx.cancellation.cancel();
        let out = registry.execute("read_many_files", serde_json::json!({"paths": ["x"]}), &ctx).await;
        assert!(out.is_error);
    }
}
