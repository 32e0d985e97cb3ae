use async_trait::async_trait;
use occ_core::Embedder;
use occ_pipeline::error::PipelineError;
use occ_pipeline::types::{CompletionRequest, CompletionResult};
use occ_pipeline::CompletionProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint (§6 "Upstream
/// model provider"), narrowed to this pipeline's own
/// `CompletionRequest`/`CompletionResult` types so no upstream wire shape
/// leaks past `occ_pipeline::CompletionProvider`.
///
/// Non-streaming only: the provider's own incremental chat API is outside
/// this system's scope (§1 "the upstream model provider's internals").
/// `CompletionProvider::complete_streaming`'s default degrades this to a
/// single `Delta` event carrying the whole reply.
pub struct OpenAiCompletionProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompletionProvider {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, base_url, model }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> occ_pipeline::error::Result<CompletionResult> {
        let body = ChatRequestBody {
            model: &self.model,
            messages: request.messages.iter().map(wire_message).collect(),
            tools: request.tools.iter().map(wire_tool).collect(),
            stream: false,
        };

        debug!(model = %self.model, messages = request.messages.len(), "calling upstream completion endpoint");

        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Core(occ_core::OrchestrationError::UpstreamUnavailable(e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "upstream completion call failed");
            if status.as_u16() == 429 {
                return Err(PipelineError::Core(occ_core::OrchestrationError::RateLimited { retry_after_ms: 5000 }));
            }
            return Err(PipelineError::Core(occ_core::OrchestrationError::UpstreamUnavailable(text)));
        }

        let parsed: ChatResponseBody = resp
            .json()
            .await
            .map_err(|e| PipelineError::Core(occ_core::OrchestrationError::SchemaViolation(e.to_string())))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Core(occ_core::OrchestrationError::SchemaViolation("empty choices array".to_string())))?;

        Ok(CompletionResult {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls.into_iter().flatten().map(wire_tool_call_to_core).collect(),
            tokens_in: parsed.usage.as_ref().map(|u| u.prompt_tokens).unwrap_or(0),
            tokens_out: parsed.usage.as_ref().map(|u| u.completion_tokens).unwrap_or(0),
        })
    }
}

fn wire_message(m: &occ_core::types::Message) -> WireMessage {
    WireMessage {
        role: match m.role {
            occ_core::types::Role::User => "user",
            occ_core::types::Role::Assistant => "assistant",
            occ_core::types::Role::Tool => "tool",
            occ_core::types::Role::System => "system",
        },
        content: if m.content.is_empty() { None } else { Some(m.content.clone()) },
        tool_call_id: m.tool_call_id.clone(),
        tool_calls: if m.tool_calls.is_empty() { None } else { Some(m.tool_calls.iter().map(wire_tool_call_from_core).collect()) },
    }
}

fn wire_tool(t: &occ_tools::ToolDefinition) -> WireTool {
    WireTool { r#type: "function", function: WireFunction { name: t.name.clone(), description: t.description.clone(), parameters: t.input_schema.clone() } }
}

fn wire_tool_call_from_core(c: &occ_core::types::ToolCall) -> WireToolCall {
    WireToolCall { id: c.id.clone(), r#type: "function", function: WireFunctionCall { name: c.name.clone(), arguments: c.arguments.to_string() } }
}

fn wire_tool_call_to_core(c: WireToolCall) -> occ_core::types::ToolCall {
    occ_core::types::ToolCall {
        id: c.id,
        name: c.function.name,
        arguments: serde_json::from_str(&c.function.arguments).unwrap_or(serde_json::Value::Null),
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    r#type: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Calls an OpenAI-compatible `/v1/embeddings` endpoint, used by the
/// template router (§4.G) and retrieval orchestrator (§4.F) to embed query
/// text before a vector search. Grounded on the same `OpenAiProvider`
/// pattern as `OpenAiCompletionProvider`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), api_key, base_url, model }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> occ_core::Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Embedding>,
        }
        #[derive(Deserialize)]
        struct Embedding {
            embedding: Vec<f32>,
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Req { model: &self.model, input: text })
            .send()
            .await
            .map_err(|e| occ_core::OrchestrationError::UpstreamUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(occ_core::OrchestrationError::UpstreamUnavailable(text));
        }

        let parsed: Resp = resp.json().await.map_err(|e| occ_core::OrchestrationError::SchemaViolation(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| occ_core::OrchestrationError::SchemaViolation("empty embeddings response".to_string()))
    }
}
