use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS prompt_templates (
            id                TEXT PRIMARY KEY,
            name              TEXT NOT NULL,
            content           TEXT NOT NULL,
            category          TEXT NOT NULL,
            triggers          TEXT NOT NULL DEFAULT '[]',
            allowed_groups    TEXT NOT NULL DEFAULT '[]',
            is_default        INTEGER NOT NULL DEFAULT 0,
            is_active         INTEGER NOT NULL DEFAULT 1,
            model_preferences TEXT NOT NULL DEFAULT '[]',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prompt_assignments (
            user_id     TEXT PRIMARY KEY,
            template_id TEXT NOT NULL,
            assigned_by TEXT NOT NULL,
            assigned_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prompt_selection_log (
            template_id TEXT NOT NULL,
            count       INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (template_id)
        );",
    )?;
    Ok(())
}
