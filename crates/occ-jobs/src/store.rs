use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{BackgroundJob, JobStatus};

/// CRUD handle over the job log, usable concurrently with a running
/// [`crate::watcher::JobWatcher`] poll loop — one owns mutation, the other
/// owns the tick loop, both over the same table.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    #[instrument(skip(self), fields(session_id, user_id))]
    pub fn enqueue(&self, session_id: &str, user_id: &str) -> Result<BackgroundJob> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO background_jobs (id, status, session_id, user_id, created_at)
             VALUES (?1, 'queued', ?2, ?3, ?4)",
            params![id, session_id, user_id, now],
        )?;
        Ok(BackgroundJob {
            id,
            status: JobStatus::Queued,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            result: None,
            error: None,
            completed_at: None,
            created_at: now,
        })
    }

    pub fn mark_running(&self, job_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE background_jobs SET status = 'running' WHERE id = ?1 AND status = 'queued'",
            params![job_id],
        )?;
        Ok(())
    }

    pub fn mark_completed(&self, job_id: &str, result: serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE background_jobs SET status = 'completed', result = ?1, completed_at = ?2 WHERE id = ?3",
            params![result.to_string(), now, job_id],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, job_id: &str, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE background_jobs SET status = 'failed', error = ?1, completed_at = ?2 WHERE id = ?3",
            params![error, now, job_id],
        )?;
        Ok(())
    }

    /// All jobs currently queued or running — the watcher's poll set.
    pub fn list_in_flight(&self) -> Result<Vec<BackgroundJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, status, session_id, user_id, result, error, completed_at, created_at
             FROM background_jobs WHERE status IN ('queued', 'running')",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<BackgroundJob>> {
        let conn = self.conn.lock().unwrap();
        match conn.query_row(
            "SELECT id, status, session_id, user_id, result, error, completed_at, created_at
             FROM background_jobs WHERE id = ?1",
            params![job_id],
            row_to_job,
        ) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackgroundJob> {
    let status: String = row.get(1)?;
    let result: Option<String> = row.get(4)?;
    Ok(BackgroundJob {
        id: row.get(0)?,
        status: JobStatus::parse(&status).unwrap_or(JobStatus::Queued),
        session_id: row.get(2)?,
        user_id: row.get(3)?,
        result: result.and_then(|r| serde_json::from_str(&r).ok()),
        error: row.get(5)?,
        completed_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}
