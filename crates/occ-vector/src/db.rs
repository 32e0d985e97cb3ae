use rusqlite::Connection;

use crate::error::Result;

/// Creates the collection registry and row tables. Safe to call on every
/// process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS vector_collections (
            name      TEXT PRIMARY KEY,
            dimension INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS vector_rows (
            collection    TEXT NOT NULL,
            id            TEXT NOT NULL,
            embedding     BLOB NOT NULL,
            metadata      TEXT NOT NULL,
            owner_user_id TEXT,
            PRIMARY KEY (collection, id)
        );
        CREATE INDEX IF NOT EXISTS idx_vector_rows_owner
            ON vector_rows(collection, owner_user_id);",
    )?;
    Ok(())
}

pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
