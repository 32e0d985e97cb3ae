use serde::{Deserialize, Serialize};

/// A system-prompt template selectable by semantic intent and user group
/// (§4.G, §3 Prompt Template data model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub category: String,
    pub triggers: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub model_preferences: Vec<String>,
}

/// Inputs a caller supplies alongside the raw query text (§4.G step 1).
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub user_groups: Vec<String>,
    pub recent_messages: Vec<String>,
}

/// Per-template usage counters surfaced by `GetStats` (§4.G contract).
#[derive(Debug, Clone, Serialize, Default)]
pub struct TemplateStats {
    pub template_id: String,
    pub selections: u64,
    pub assignments: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct ScoredCandidate {
    pub template: Template,
    pub score: f32,
}
