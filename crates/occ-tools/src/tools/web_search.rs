//! `web_search` — query a web search backend (§4.H catalogue).
//!
//! The backend is pluggable behind [`SearchBackend`] so the default HTTP
//! implementation can be swapped for a fake in tests.

use async_trait::async_trait;
use serde::Deserialize;

use crate::registry::Tool;
use crate::types::{InvocationContext, ToolOutput};

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, String>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// HTTP-backed search client against a configurable endpoint returning
/// `{"results": [{"title", "url", "snippet"}, ...]}`.
pub struct HttpSearchBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSearchBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, String> {
        #[derive(Deserialize)]
        struct Response {
            results: Vec<SearchHit>,
        }
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("search backend returned {}", resp.status()));
        }
        let parsed: Response = resp.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.results)
    }
}

pub struct WebSearchTool {
    backend: Box<dyn SearchBackend>,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self { backend: Box::new(HttpSearchBackend::new("https://search.invalid/search")) }
    }
}

impl WebSearchTool {
    pub fn with_backend(backend: Box<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return ranked titles, URLs, and snippets."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "description": "Maximum results (default 5)." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value, ctx: &InvocationContext) -> ToolOutput {
        let Some(query) = args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::error("missing required parameter: query");
        };
        let limit = args.get("limit").and_then(|v| v.as_u64()).unwrap_or(5) as usize;

        let search = self.backend.search(query, limit);
        let result = tokio::select! {
            r = search => r,
            _ = ctx.cancellation.cancelled() => return ToolOutput::error("web_search cancelled"),
        };

        match result {
            Ok(hits) if hits.is_empty() => ToolOutput::success("no results found"),
            Ok(hits) => {
                let rendered = hits
                    .iter()
                    .map(|h| format!("- {} ({})\n  {}", h.title, h.url, h.snippet))
                    .collect::<Vec<_>>()
                    .join("\n");
                ToolOutput::success(rendered)
            }
            Err(e) => ToolOutput::error(format!("web_search failed: {e}")),
        }
    }
}
