use std::sync::Mutex;

use rusqlite::{params, Connection};
use tokio::sync::watch;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, UserError};
use crate::types::{AccessRequest, AccessRequestStatus};

/// Read/write runtime configuration: role/routing/slider overrides, allowed
/// user and domain lists, and access requests (§4.N).
///
/// Writes bump a shared version counter before returning; G/J hold a
/// `watch::Receiver` and treat any change as "my cached config is stale" —
/// a last-value-wins signal rather than a fan-out event log, since routing
/// and budget caches only ever need to know "go re-read".
pub struct AdminControlPlane {
    db: Mutex<Connection>,
    invalidation: watch::Sender<u64>,
}

impl AdminControlPlane {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        let (invalidation, _) = watch::channel(0);
        Ok(Self { db: Mutex::new(conn), invalidation })
    }

    pub fn subscribe_invalidation(&self) -> watch::Receiver<u64> {
        self.invalidation.subscribe()
    }

    fn bump(&self) {
        self.invalidation.send_modify(|v| *v += 1);
    }

    #[instrument(skip(self, value), fields(key))]
    pub fn set_runtime_config(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO runtime_config (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        drop(db);
        self.bump();
        Ok(())
    }

    pub fn get_runtime_config(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        match db.query_row("SELECT value FROM runtime_config WHERE key = ?1", params![key], |r| r.get(0)) {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(UserError::Database(e)),
        }
    }

    pub fn list_runtime_config(&self) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT key, value FROM runtime_config ORDER BY key")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn allow_user(&self, user_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO allowed_users (user_id, added_at) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, now],
        )?;
        drop(db);
        self.bump();
        Ok(())
    }

    pub fn disallow_user(&self, user_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM allowed_users WHERE user_id = ?1", params![user_id])?;
        drop(db);
        self.bump();
        Ok(())
    }

    pub fn is_user_allowed(&self, user_id: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM allowed_users WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self), fields(domain))]
    pub fn allow_domain(&self, domain: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO allowed_domains (domain, added_at) VALUES (?1, ?2)
             ON CONFLICT(domain) DO NOTHING",
            params![domain, now],
        )?;
        drop(db);
        self.bump();
        Ok(())
    }

    pub fn is_domain_allowed(&self, domain: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM allowed_domains WHERE domain = ?1",
            params![domain],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self), fields(user_id, action_type))]
    pub fn request_access(&self, user_id: &str, action_type: &str) -> Result<AccessRequest> {
        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO access_requests (id, user_id, action_type, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![id, user_id, action_type, now],
        )?;
        Ok(AccessRequest {
            id,
            user_id: user_id.to_string(),
            action_type: action_type.to_string(),
            status: AccessRequestStatus::Pending,
            created_at: now,
            decided_at: None,
            decided_by: None,
        })
    }

    pub fn list_pending_requests(&self) -> Result<Vec<AccessRequest>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, action_type, status, created_at, decided_at, decided_by
             FROM access_requests WHERE status = 'pending' ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_request)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Approves or denies a pending request. Admin actions here are expected
    /// to be paired with an audit entry by the caller (§4.N, §4.M) — this
    /// component only owns the request's own state.
    #[instrument(skip(self), fields(request_id, approve, by))]
    pub fn decide_request(&self, request_id: &str, approve: bool, by: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let status = if approve { "approved" } else { "denied" };
        let n = db.execute(
            "UPDATE access_requests SET status = ?1, decided_at = ?2, decided_by = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![status, now, by, request_id],
        )?;
        if n == 0 {
            return Err(UserError::RequestNotFound(request_id.to_string()));
        }
        drop(db);
        self.bump();
        Ok(())
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessRequest> {
    let status: String = row.get(3)?;
    Ok(AccessRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_type: row.get(2)?,
        status: match status.as_str() {
            "approved" => AccessRequestStatus::Approved,
            "denied" => AccessRequestStatus::Denied,
            _ => AccessRequestStatus::Pending,
        },
        created_at: row.get(4)?,
        decided_at: row.get(5)?,
        decided_by: row.get(6)?,
    })
}
