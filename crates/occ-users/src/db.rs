use rusqlite::Connection;

use crate::error::Result;

/// Creates the users, API key, access-request, allow-list, and runtime
/// config tables. Safe to call on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            groups     TEXT NOT NULL DEFAULT '[]',
            is_admin   INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS api_keys (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            prefix        TEXT NOT NULL,
            key_hash      TEXT NOT NULL,
            tier          TEXT NOT NULL,
            custom_limits TEXT,
            active        INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_user ON api_keys(user_id);

        CREATE TABLE IF NOT EXISTS access_requests (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            action_type TEXT NOT NULL,
            status      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            decided_at  TEXT,
            decided_by  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_access_requests_status
            ON access_requests(status, created_at);

        CREATE TABLE IF NOT EXISTS allowed_users (
            user_id    TEXT PRIMARY KEY,
            added_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS allowed_domains (
            domain     TEXT PRIMARY KEY,
            added_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS runtime_config (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}
