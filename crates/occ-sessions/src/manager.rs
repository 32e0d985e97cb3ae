use std::sync::Mutex;

use occ_core::types::{Message, Role, TokenUsage};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::types::Session;

/// Owns Session and Message persistence (§3 data model). Wraps a single
/// SQLite connection in a `Mutex` — sufficient for the single-node target.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn create(&self, user_id: &str, title: Option<&str>) -> Result<Session> {
        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO sessions (id, user_id, title, created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
            params![id, user_id, title, now],
        )?;
        Ok(Session {
            id,
            user_id: user_id.to_string(),
            title: title.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
            deleted: false,
        })
    }

    #[instrument(skip(self), fields(id))]
    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, user_id, title, created_at, updated_at, deleted FROM sessions WHERE id = ?1",
            params![id],
            row_to_session,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Database(e)),
        }
    }

    #[instrument(skip(self), fields(user_id, limit))]
    pub fn list_for_user(&self, user_id: &str, limit: usize, include_deleted: bool) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap();
        let sql = if include_deleted {
            "SELECT id, user_id, title, created_at, updated_at, deleted FROM sessions
             WHERE user_id = ?1 ORDER BY updated_at DESC LIMIT ?2"
        } else {
            "SELECT id, user_id, title, created_at, updated_at, deleted FROM sessions
             WHERE user_id = ?1 AND deleted = 0 ORDER BY updated_at DESC LIMIT ?2"
        };
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params![user_id, limit as i64], row_to_session)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self), fields(id))]
    pub fn soft_delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let n = db.execute(
            "UPDATE sessions SET deleted = 1, updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        if n == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Hard-deletes a session and cascades to its messages (§3 ownership).
    #[instrument(skip(self), fields(id))]
    pub fn hard_delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM messages WHERE session_id = ?1", params![id])?;
        let n = db.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    #[instrument(skip(self, message), fields(session_id = %message.session_id))]
    pub fn append_message(&self, message: &Message) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO messages (id, session_id, role, content, created_at, tool_call_id, tool_calls, attachments, usage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.id,
                message.session_id,
                role_to_str(message.role),
                message.content,
                message.created_at,
                message.tool_call_id,
                serde_json::to_string(&message.tool_calls).unwrap_or_else(|_| "[]".into()),
                serde_json::to_string(&message.attachments).unwrap_or_else(|_| "[]".into()),
                message.usage.map(|u| serde_json::to_string(&u).unwrap()),
            ],
        )?;
        db.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![message.created_at, message.session_id],
        )?;
        Ok(())
    }

    /// Removes a single message by id. Used by the pipeline's persistence
    /// stage `rollback` to undo its own commit when a turn aborts after
    /// already writing rows (§4.J "rollback(ctx)").
    #[instrument(skip(self), fields(id))]
    pub fn delete_message(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id, limit))]
    pub fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, role, content, created_at, tool_call_id, tool_calls, attachments, usage
             FROM messages WHERE session_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id, limit as i64], row_to_message)?;
        let mut messages: Vec<Message> = rows.filter_map(|r| r.ok()).collect();
        messages.reverse();
        Ok(messages)
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::System => "system",
    }
}

fn str_to_role(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        "system" => Role::System,
        _ => Role::User,
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        deleted: row.get::<_, i64>(5)? != 0,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(2)?;
    let tool_calls: String = row.get(6)?;
    let attachments: String = row.get(7)?;
    let usage: Option<String> = row.get(8)?;
    Ok(Message {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: str_to_role(&role),
        content: row.get(3)?,
        created_at: row.get(4)?,
        tool_call_id: row.get(5)?,
        tool_calls: serde_json::from_str(&tool_calls).unwrap_or_default(),
        attachments: serde_json::from_str(&attachments).unwrap_or_default(),
        usage: usage.and_then(|u| serde_json::from_str::<TokenUsage>(&u).ok()),
    })
}
