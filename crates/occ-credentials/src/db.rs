use rusqlite::Connection;

use crate::error::Result;

/// Initialise the credentials table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS credentials (
            user_id       TEXT PRIMARY KEY,
            access_token  TEXT NOT NULL,
            id_token      TEXT,
            refresh_token TEXT,
            expires_at    TEXT NOT NULL,
            scope         TEXT NOT NULL,
            tenant_id     TEXT,
            updated_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credentials_expiry
            ON credentials(expires_at);",
    )?;
    Ok(())
}
