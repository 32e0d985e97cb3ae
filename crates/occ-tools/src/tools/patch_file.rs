//! `patch_file` — apply a unified-diff patch to a file (§4.H catalogue).
//!
//! Accepts a standard unified diff body (the `--- a/...` / `+++ b/...`
//! headers are optional and ignored if present; only `@@ ... @@` hunks are
//! applied). Writes are atomic via temp file + rename, mirroring the
//! teacher's `patch_file` tool.

use async_trait::async_trait;

use crate::registry::Tool;
use crate::types::{InvocationContext, ToolOutput};

pub struct PatchFileTool;

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Apply a unified-diff patch to a file. The patch body must contain one or more \
         `@@ -start,len +start,len @@` hunks with ` ` (context), `-` (removed), and `+` \
         (added) prefixed lines. Fails if a hunk's context does not match the file exactly."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to patch." },
                "patch": { "type": "string", "description": "Unified diff body." }
            },
            "required": ["path", "patch"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput {
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::error("missing required parameter: path");
        };
        let Some(patch) = args.get("patch").and_then(|v| v.as_str()) else {
            return ToolOutput::error("missing required parameter: patch");
        };

        let full_path = if std::path::Path::new(path).is_absolute() {
            std::path::PathBuf::from(path)
        } else {
            ctx.working_dir.join(path)
        };

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::error(format!("failed to read '{path}': {e}")),
        };

        let hunks = match parse_unified_diff(patch) {
            Ok(h) => h,
            Err(e) => return ToolOutput::error(format!("invalid unified diff: {e}")),
        };
        if hunks.is_empty() {
            return ToolOutput::error("patch contains no hunks");
        }

        let patched = match apply_hunks(&content, &hunks) {
            Ok(p) => p,
            Err(e) => return ToolOutput::error(format!("failed to apply patch to '{path}': {e}")),
        };

        let tmp_path = full_path.with_extension("occ_patch_tmp");
        if let Err(e) = tokio::fs::write(&tmp_path, &patched).await {
            return ToolOutput::error(format!("failed to write temp file: {e}"));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &full_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return ToolOutput::error(format!("failed to rename temp file into place: {e}"));
        }

        ToolOutput::success(format!("patched '{path}': applied {} hunk(s)", hunks.len()))
    }
}

struct Hunk {
    /// 0-based start line in the original file.
    orig_start: usize,
    lines: Vec<HunkLine>,
}

enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

fn parse_unified_diff(patch: &str) -> Result<Vec<Hunk>, String> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in patch.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("@@ ") {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            let header = rest.split(" @@").next().unwrap_or(rest);
            let orig_start = parse_hunk_start(header).ok_or_else(|| format!("unparseable hunk header: {line}"))?;
            current = Some(Hunk { orig_start, lines: Vec::new() });
            continue;
        }
        let Some(hunk) = current.as_mut() else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(format!("content outside of any hunk: {line}"));
        };
        if let Some(text) = line.strip_prefix('+') {
            hunk.lines.push(HunkLine::Add(text.to_string()));
        } else if let Some(text) = line.strip_prefix('-') {
            hunk.lines.push(HunkLine::Remove(text.to_string()));
        } else {
            let text = line.strip_prefix(' ').unwrap_or(line);
            hunk.lines.push(HunkLine::Context(text.to_string()));
        }
    }
    if let Some(h) = current.take() {
        hunks.push(h);
    }
    Ok(hunks)
}

/// Parses `-start,len +start,len` into the 0-based original start line.
fn parse_hunk_start(header: &str) -> Option<usize> {
    let minus = header.split_whitespace().find(|p| p.starts_with('-'))?;
    let start: usize = minus.trim_start_matches('-').split(',').next()?.parse().ok()?;
    Some(start.saturating_sub(1))
}

fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let had_trailing_newline = content.ends_with('\n');

    // Apply in reverse order so earlier hunks' offsets don't shift later ones.
    for hunk in hunks.iter().rev() {
        let mut cursor = hunk.orig_start;
        let mut replacement = Vec::new();

        for hl in &hunk.lines {
            match hl {
                HunkLine::Context(text) => {
                    verify_line(&lines, cursor, text)?;
                    replacement.push(text.clone());
                    cursor += 1;
                }
                HunkLine::Remove(text) => {
                    verify_line(&lines, cursor, text)?;
                    cursor += 1;
                }
                HunkLine::Add(text) => {
                    replacement.push(text.clone());
                }
            }
        }

        let removed = hunk.lines.iter().filter(|l| matches!(l, HunkLine::Context(_) | HunkLine::Remove(_))).count();
        lines.splice(hunk.orig_start..hunk.orig_start + removed, replacement);
    }

    let mut out = lines.join("\n");
    if had_trailing_newline {
        out.push('\n');
    }
    Ok(out)
}

fn verify_line(lines: &[String], index: usize, expected: &str) -> Result<(), String> {
    match lines.get(index) {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(format!("context mismatch at line {}: expected {expected:?}, found {actual:?}", index + 1)),
        None => Err(format!("hunk references line {} past end of file", index + 1)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn applies_a_single_hunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = InvocationContext::new(dir.path(), "u1", Duration::from_secs(5));

        let patch = "@@ -2,1 +2,1 @@\n-two\n+TWO\n";
        let out = PatchFileTool.execute(serde_json::json!({"path": "f.txt", "patch": patch}), &ctx).await;

        assert!(!out.is_error, "{}", out.content);
        let result = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(result, "one\nTWO\nthree\n");
    }

    #[tokio::test]
    async fn mismatched_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = InvocationContext::new(dir.path(), "u1", Duration::from_secs(5));

        let patch = "@@ -2,1 +2,1 @@\n-nope\n+TWO\n";
        let out = PatchFileTool.execute(serde_json::json!({"path": "f.txt", "patch": patch}), &ctx).await;
        assert!(out.is_error);
    }
}
