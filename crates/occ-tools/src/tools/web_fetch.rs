//! `web_fetch` — fetch a URL and convert HTML to readable text (§4.H).
//!
//! Carries a hard 30-second cap (§4.H), independent of any per-tool
//! timeout the caller's [`InvocationContext`] already applies — this is the
//! tool's own ceiling on the underlying HTTP request.

use std::time::Duration;

use async_trait::async_trait;

use crate::registry::Tool;
use crate::types::{InvocationContext, ToolOutput};

const HARD_CAP: Duration = Duration::from_secs(30);
const MAX_OUTPUT_CHARS: usize = 50_000;

pub struct WebFetchTool {
    client: reqwest::Client,
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(HARD_CAP)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its readable text content, with HTML converted to plain \
         text. Capped at 30 seconds."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput {
        let Some(url) = args.get("url").and_then(|v| v.as_str()) else {
            return ToolOutput::error("missing required parameter: url");
        };

        let fetch = self.fetch_and_convert(url);
        let result = tokio::select! {
            r = fetch => r,
            _ = ctx.cancellation.cancelled() => return ToolOutput::error("web_fetch cancelled"),
            _ = tokio::time::sleep(HARD_CAP) => return ToolOutput::error(format!("web_fetch exceeded {}s hard cap", HARD_CAP.as_secs())),
        };

        match result {
            Ok(text) => {
                let truncated = if text.len() > MAX_OUTPUT_CHARS {
                    format!("{}\n\n[truncated at {MAX_OUTPUT_CHARS} characters]", &text[..MAX_OUTPUT_CHARS])
                } else {
                    text
                };
                ToolOutput::success(truncated)
            }
            Err(e) => ToolOutput::error(format!("web_fetch failed: {e}")),
        }
    }
}

impl WebFetchTool {
    async fn fetch_and_convert(&self, url: &str) -> Result<String, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("server returned {}", resp.status()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = resp.text().await.map_err(|e| e.to_string())?;

        if content_type.contains("html") {
            Ok(html2text::from_read(body.as_bytes(), 100))
        } else {
            Ok(body)
        }
    }
}
