use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ranked type of a persisted memory row (§3 `Memory`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    ConversationSummary,
    DomainKnowledge,
    EntityFact,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::ConversationSummary => "conversation_summary",
            MemoryKind::DomainKnowledge => "domain_knowledge",
            MemoryKind::EntityFact => "entity_fact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conversation_summary" => Some(MemoryKind::ConversationSummary),
            "domain_knowledge" => Some(MemoryKind::DomainKnowledge),
            "entity_fact" => Some(MemoryKind::EntityFact),
            _ => None,
        }
    }
}

/// Which tier a memory was selected for when returned from `Search` (§4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Most recent conversation-summary rows, ordered by recency only.
    Recent,
    /// Older conversation-summary rows, ranked by relevance.
    Summary,
    /// Domain-knowledge / entity-fact rows, ranked by composite score.
    LongTerm,
}

/// A ranked memory item (§3 `Memory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub kind: MemoryKind,
    pub tier: MemoryTier,
    pub content: String,
    pub summary: Option<String>,
    pub relevance: f64,
    pub importance: f64,
    pub entities: Vec<String>,
    pub token_count: u32,
    pub reasons: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// Composite score used to order tier 3 (`0.7*importance + 0.3*relevance`);
    /// tier 2 orders by `relevance` alone and tier 1 by recency alone (§4.D).
    pub fn score(&self) -> f64 {
        match self.tier {
            MemoryTier::LongTerm => 0.7 * self.importance + 0.3 * self.relevance,
            MemoryTier::Summary => self.relevance,
            MemoryTier::Recent => 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    pub kinds: Vec<MemoryKind>,
    pub min_relevance: Option<f64>,
}
