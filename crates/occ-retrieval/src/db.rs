use rusqlite::Connection;

use crate::error::Result;

/// The search log is used only for analytics (§4.F) — it records what was
/// asked, never the results, so it carries no privacy burden of its own.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS retrieval_search_log (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            query        TEXT NOT NULL,
            result_count INTEGER NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_search_log_user ON retrieval_search_log(user_id, created_at DESC);",
    )?;
    Ok(())
}
