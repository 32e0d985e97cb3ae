use rusqlite::Connection;

use crate::error::Result;

/// Creates the memory table and its FTS5 index. Safe to call on every
/// process start (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_entries (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            kind        TEXT NOT NULL,
            content     TEXT NOT NULL,
            summary     TEXT,
            importance  REAL NOT NULL DEFAULT 0.5,
            entities    TEXT NOT NULL DEFAULT '[]',
            token_count INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_user_kind
            ON memory_entries(user_id, kind, created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS memory_entries_fts
            USING fts5(id UNINDEXED, content, summary);",
    )?;
    Ok(())
}
