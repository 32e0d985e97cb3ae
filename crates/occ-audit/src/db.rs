use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_records (
            id                TEXT PRIMARY KEY,
            session_id        TEXT NOT NULL,
            user_id           TEXT NOT NULL,
            templates_applied TEXT NOT NULL DEFAULT '[]',
            techniques        TEXT NOT NULL DEFAULT '[]',
            tier_counts       TEXT NOT NULL DEFAULT '{}',
            injected_sources  TEXT NOT NULL DEFAULT '[]',
            tokens_in         INTEGER NOT NULL DEFAULT 0,
            tokens_out        INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_usage_user ON usage_records(user_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_usage_session ON usage_records(session_id, created_at);

        CREATE TABLE IF NOT EXISTS admin_audit_log (
            id            TEXT PRIMARY KEY,
            admin_user_id TEXT NOT NULL,
            action        TEXT NOT NULL,
            target        TEXT,
            details       TEXT NOT NULL DEFAULT '{}',
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_admin_audit_created ON admin_audit_log(created_at DESC);",
    )?;
    Ok(())
}
