use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{instrument, warn};

use crate::db::{decode_embedding, encode_embedding};
use crate::error::{Result, VectorError};
use crate::types::{CollectionSchema, CollectionStats, VectorFilter, VectorHit, VectorRow};

/// Collection lifecycle and embedding insert/search over a vector index
/// (§4.B). Backed here by SQLite with brute-force cosine ranking; the row
/// store and index type are implementation details behind this facade, so a
/// future deployment can swap in a dedicated vector database without
/// changing callers.
pub struct VectorGateway {
    db: Mutex<Connection>,
}

impl VectorGateway {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, schema), fields(collection = name))]
    pub fn ensure_collection(&self, name: &str, schema: CollectionSchema) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO vector_collections (name, dimension) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![name, schema.dimension as i64],
        )?;
        Ok(())
    }

    fn dimension_of(&self, db: &Connection, collection: &str) -> Result<usize> {
        db.query_row(
            "SELECT dimension FROM vector_collections WHERE name = ?1",
            params![collection],
            |row| row.get::<_, i64>(0),
        )
        .map(|d| d as usize)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                VectorError::CollectionMissing(collection.to_string())
            }
            other => VectorError::Database(other),
        })
    }

    #[instrument(skip(self, rows), fields(collection, count = rows.len()))]
    pub fn insert(&self, collection: &str, rows: &[VectorRow]) -> Result<()> {
        let db = self.db.lock().unwrap();
        let dimension = self.dimension_of(&db, collection)?;

        for row in rows {
            if row.embedding.len() != dimension {
                return Err(VectorError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected: dimension,
                    got: row.embedding.len(),
                });
            }
            if row.embedding.iter().any(|v| !v.is_finite()) {
                return Err(VectorError::NonFiniteEmbedding);
            }
            db.execute(
                "INSERT INTO vector_rows (collection, id, embedding, metadata, owner_user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    embedding = excluded.embedding,
                    metadata = excluded.metadata,
                    owner_user_id = excluded.owner_user_id",
                params![
                    collection,
                    row.id,
                    encode_embedding(&row.embedding),
                    row.metadata.to_string(),
                    row.owner_user_id,
                ],
            )?;
        }
        Ok(())
    }

    #[instrument(skip(self, query_embedding, filter), fields(collection, k))]
    pub fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>> {
        let db = self.db.lock().unwrap();
        let dimension = self.dimension_of(&db, collection)?;
        if query_embedding.len() != dimension {
            return Err(VectorError::DimensionMismatch {
                collection: collection.to_string(),
                expected: dimension,
                got: query_embedding.len(),
            });
        }

        let mut stmt = db.prepare(
            "SELECT id, embedding, metadata, owner_user_id FROM vector_rows WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            let id: String = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            let metadata: String = row.get(2)?;
            let owner: Option<String> = row.get(3)?;
            Ok((id, blob, metadata, owner))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, blob, metadata, owner) = row?;
            if let Some(ref want_owner) = filter.owner_user_id {
                if owner.as_deref() != Some(want_owner.as_str()) {
                    continue;
                }
            }
            let metadata: serde_json::Value =
                serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null);
            if !filter.metadata_equals.is_empty() {
                let matches = filter
                    .metadata_equals
                    .iter()
                    .all(|(k, v)| metadata.get(k) == Some(v));
                if !matches {
                    continue;
                }
            }
            let embedding = decode_embedding(&blob);
            let score = cosine_similarity(query_embedding, &embedding);
            scored.push(VectorHit { id, score, metadata });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    #[instrument(skip(self, filter), fields(collection))]
    pub fn delete(&self, collection: &str, filter: &VectorFilter) -> Result<u64> {
        let db = self.db.lock().unwrap();
        self.dimension_of(&db, collection)?;

        if filter.metadata_equals.is_empty() {
            let n = match &filter.owner_user_id {
                Some(owner) => db.execute(
                    "DELETE FROM vector_rows WHERE collection = ?1 AND owner_user_id = ?2",
                    params![collection, owner],
                )?,
                None => db.execute("DELETE FROM vector_rows WHERE collection = ?1", params![collection])?,
            };
            return Ok(n as u64);
        }

        // Metadata predicates require row-by-row evaluation.
        let mut stmt = db.prepare(
            "SELECT id, metadata, owner_user_id FROM vector_rows WHERE collection = ?1",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        let mut to_delete = Vec::new();
        for row in rows {
            let (id, metadata, owner) = row?;
            if let Some(ref want) = filter.owner_user_id {
                if owner.as_deref() != Some(want.as_str()) {
                    continue;
                }
            }
            let metadata: serde_json::Value =
                serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null);
            if filter.metadata_equals.iter().all(|(k, v)| metadata.get(k) == Some(v)) {
                to_delete.push(id);
            }
        }
        for id in &to_delete {
            db.execute(
                "DELETE FROM vector_rows WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
        }
        Ok(to_delete.len() as u64)
    }

    #[instrument(skip(self), fields(collection))]
    pub fn stats(&self, collection: &str) -> Result<CollectionStats> {
        let db = self.db.lock().unwrap();
        let dimension = self.dimension_of(&db, collection)?;
        let row_count: i64 = db.query_row(
            "SELECT COUNT(*) FROM vector_rows WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(CollectionStats {
            name: collection.to_string(),
            dimension,
            row_count: row_count as u64,
        })
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        warn!("cosine similarity against a zero-norm vector");
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
