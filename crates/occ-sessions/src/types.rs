use serde::{Deserialize, Serialize};

/// An ordered conversation belonging to one user (§3 `Session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted: bool,
}
