//! `read_many_files` — read several files in one round-trip.
//!
//! Reads a batch of paths (§4.H); each path is read independently so one
//! missing file doesn't fail the whole call.

use async_trait::async_trait;

use crate::registry::Tool;
use crate::types::{InvocationContext, ToolOutput};

const MAX_OUTPUT_CHARS_PER_FILE: usize = 30_000;

pub struct ReadManyFilesTool;

#[async_trait]
impl Tool for ReadManyFilesTool {
    fn name(&self) -> &str {
        "read_many_files"
    }

    fn description(&self) -> &str {
        "Read the contents of one or more files. Each path is read independently; \
         a missing or unreadable file is reported inline without failing the others."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Absolute or working-directory-relative paths to read."
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput {
        let Some(paths) = args.get("paths").and_then(|v| v.as_array()) else {
            return ToolOutput::error("missing required parameter: paths");
        };
        if paths.is_empty() {
            return ToolOutput::error("paths must contain at least one entry");
        }

        let mut sections = Vec::with_capacity(paths.len());
        for value in paths {
            if ctx.cancellation.is_cancelled() {
                return ToolOutput::error("cancelled while reading files");
            }
            let Some(path) = value.as_str() else {
                sections.push("<non-string path entry skipped>".to_string());
                continue;
            };
            let full_path = resolve(&ctx.working_dir, path);
            match tokio::fs::read_to_string(&full_path).await {
                Ok(content) => {
                    let truncated = if content.len() > MAX_OUTPUT_CHARS_PER_FILE {
                        format!("{}\n\n[truncated at {} characters]", &content[..MAX_OUTPUT_CHARS_PER_FILE], MAX_OUTPUT_CHARS_PER_FILE)
                    } else {
                        content
                    };
                    sections.push(format!("--- {path} ---\n{truncated}"));
                }
                Err(e) => sections.push(format!("--- {path} ---\n<error: {e}>")),
            }
        }

        ToolOutput::success(sections.join("\n\n"))
    }
}

fn resolve(working_dir: &std::path::Path, path: &str) -> std::path::PathBuf {
    let p = std::path::Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        working_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn reads_multiple_files_independently() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let ctx = InvocationContext::new(dir.path(), "u1", Duration::from_secs(5));

        let out = ReadManyFilesTool
            .execute(serde_json::json!({"paths": ["a.txt", "missing.txt"]}), &ctx)
            .await;

        assert!(!out.is_error);
        assert!(out.content.contains("hello"));
        assert!(out.content.contains("<error:"));
    }
}
