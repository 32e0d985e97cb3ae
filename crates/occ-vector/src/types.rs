use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of typed collections the gateway serves (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    UserMemory,
    UserArtifacts,
    AppDocumentation,
    ChatConversations,
    Code,
    AwcodeSessions,
    AwcodeSharedSolutions,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 7] = [
        CollectionKind::UserMemory,
        CollectionKind::UserArtifacts,
        CollectionKind::AppDocumentation,
        CollectionKind::ChatConversations,
        CollectionKind::Code,
        CollectionKind::AwcodeSessions,
        CollectionKind::AwcodeSharedSolutions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::UserMemory => "user-memory",
            CollectionKind::UserArtifacts => "user-artifacts",
            CollectionKind::AppDocumentation => "app-documentation",
            CollectionKind::ChatConversations => "chat-conversations",
            CollectionKind::Code => "code",
            CollectionKind::AwcodeSessions => "awcode-sessions",
            CollectionKind::AwcodeSharedSolutions => "awcode-shared-solutions",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collection's declared schema. Dimension defaults to 1536 per §4.B.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    pub dimension: usize,
}

impl Default for CollectionSchema {
    fn default() -> Self {
        Self { dimension: 1536 }
    }
}

/// One row submitted to `Insert`. `id` duplicates overwrite (§4.B invariant).
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub owner_user_id: Option<String>,
}

/// A single ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// A metadata-equality filter applied at `Search`/`Delete` time.
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub owner_user_id: Option<String>,
    pub metadata_equals: Vec<(String, serde_json::Value)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub name: String,
    pub dimension: usize,
    pub row_count: u64,
}
