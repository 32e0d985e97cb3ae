use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS background_jobs (
            id           TEXT PRIMARY KEY,
            status       TEXT NOT NULL,
            session_id   TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            result       TEXT,
            error        TEXT,
            completed_at TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_status ON background_jobs(status);
        CREATE INDEX IF NOT EXISTS idx_jobs_session ON background_jobs(session_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_user ON background_jobs(user_id);",
    )?;
    Ok(())
}
