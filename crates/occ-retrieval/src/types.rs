use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which collection families a search may dispatch to (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Memory,
    Artifact,
    Document,
}

/// Options accepted by `Search` (§4.F contract).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub include_memories: bool,
    pub include_artifacts: bool,
    pub include_documents: bool,
    pub types: Vec<ResultType>,
    pub limit: usize,
    pub threshold: f32,
    pub time_filter: Option<DateTime<Utc>>,
    pub metadata_filters: Vec<(String, serde_json::Value)>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            include_memories: true,
            include_artifacts: true,
            include_documents: true,
            types: Vec::new(),
            limit: 20,
            threshold: 0.0,
            time_filter: None,
            metadata_filters: Vec::new(),
        }
    }
}

/// A single hit after conversion to the orchestrator's unified shape (§4.F).
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedResult {
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub source: String,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub reasons: Vec<String>,
}
