use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::types::{Memory, MemoryFilters, MemoryKind, MemoryTier};

/// How many of the most recent conversation-summary rows count as tier 1
/// ("recent turns") rather than tier 2 ("summaries"). See the "tiers over
/// conversation_summary rows" decision in the grounding ledger.
const RECENT_WINDOW: usize = 10;

/// Query ranked memories across the recent/summary/long-term tiers (§4.D).
pub struct MemoryManager {
    db: Mutex<Connection>,
}

impl MemoryManager {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, content, summary, entities), fields(user_id, kind = kind.as_str()))]
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        user_id: &str,
        kind: MemoryKind,
        content: &str,
        summary: Option<&str>,
        importance: f64,
        entities: &[String],
        token_count: u32,
    ) -> Result<String> {
        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let entities_json = serde_json::to_string(entities).unwrap_or_else(|_| "[]".to_string());

        db.execute(
            "INSERT INTO memory_entries
                (id, user_id, kind, content, summary, importance, entities, token_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![id, user_id, kind.as_str(), content, summary, importance, entities_json, token_count, now],
        )?;
        db.execute(
            "INSERT INTO memory_entries_fts (id, content, summary) VALUES (?1, ?2, ?3)",
            params![id, content, summary.unwrap_or_default()],
        )?;
        Ok(id)
    }

    pub fn forget(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM memory_entries WHERE id = ?1", params![id])?;
        db.execute("DELETE FROM memory_entries_fts WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(MemoryError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Ranked memories across all three tiers, most relevant/recent first
    /// within each tier, concatenated recent → summary → long-term and
    /// truncated to `limit` overall.
    #[instrument(skip(self, filters), fields(user_id, query, limit))]
    pub fn search(
        &self,
        user_id: &str,
        query: &str,
        filters: &MemoryFilters,
        limit: usize,
    ) -> Result<Vec<Memory>> {
        let db = self.db.lock().unwrap();

        let mut recent = self.load_recent(&db, user_id)?;
        let mut summaries = self.load_summaries(&db, user_id, query)?;
        let mut long_term = self.load_long_term(&db, user_id, query)?;

        if !filters.kinds.is_empty() {
            let keep = |m: &Memory| filters.kinds.contains(&m.kind);
            recent.retain(keep);
            summaries.retain(keep);
            long_term.retain(keep);
        }
        if let Some(min_relevance) = filters.min_relevance {
            summaries.retain(|m| m.relevance >= min_relevance);
            long_term.retain(|m| m.relevance >= min_relevance);
        }

        summaries.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap());
        long_term.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap());

        let mut out = Vec::with_capacity(limit);
        out.extend(recent);
        out.extend(summaries);
        out.extend(long_term);
        out.truncate(limit);
        Ok(out)
    }

    fn load_recent(&self, db: &Connection, user_id: &str) -> Result<Vec<Memory>> {
        let mut stmt = db.prepare(
            "SELECT id, user_id, kind, content, summary, importance, entities, token_count, created_at
             FROM memory_entries
             WHERE user_id = ?1 AND kind = 'conversation_summary'
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, RECENT_WINDOW as i64], |row| {
            row_to_memory(row, MemoryTier::Recent, 0.0)
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn load_summaries(&self, db: &Connection, user_id: &str, query: &str) -> Result<Vec<Memory>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = db.prepare(
            "SELECT m.id, m.user_id, m.kind, m.content, m.summary, m.importance,
                    m.entities, m.token_count, m.created_at, bm25(memory_entries_fts) AS rank
             FROM memory_entries m
             JOIN memory_entries_fts f ON f.id = m.id
             WHERE m.user_id = ?1 AND m.kind = 'conversation_summary'
               AND m.id NOT IN (
                   SELECT id FROM memory_entries
                   WHERE user_id = ?1 AND kind = 'conversation_summary'
                   ORDER BY created_at DESC LIMIT ?2)
               AND memory_entries_fts MATCH ?3
             ORDER BY rank",
        )?;
        let rows = stmt.query_map(
            params![user_id, RECENT_WINDOW as i64, fts_query(query)],
            |row| {
                let rank: f64 = row.get(9)?;
                row_to_memory(row, MemoryTier::Summary, bm25_to_relevance(rank))
            },
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn load_long_term(&self, db: &Connection, user_id: &str, query: &str) -> Result<Vec<Memory>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = db.prepare(
            "SELECT m.id, m.user_id, m.kind, m.content, m.summary, m.importance,
                    m.entities, m.token_count, m.created_at, bm25(memory_entries_fts) AS rank
             FROM memory_entries m
             JOIN memory_entries_fts f ON f.id = m.id
             WHERE m.user_id = ?1 AND m.kind IN ('domain_knowledge', 'entity_fact')
               AND memory_entries_fts MATCH ?2
             ORDER BY rank",
        )?;
        let rows = stmt.query_map(params![user_id, fts_query(query)], |row| {
            let rank: f64 = row.get(9)?;
            row_to_memory(row, MemoryTier::LongTerm, bm25_to_relevance(rank))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

/// FTS5's `bm25()` returns a negative-is-better raw score with no fixed
/// range; squash it into `[0, 1]` to match the 0..1 relevance scale used
/// elsewhere (§4.D).
fn bm25_to_relevance(rank: f64) -> f64 {
    1.0 / (1.0 + (-rank).max(0.0))
}

/// Escape FTS5 query syntax characters by quoting the whole phrase.
fn fts_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

fn row_to_memory(row: &rusqlite::Row<'_>, tier: MemoryTier, relevance: f64) -> rusqlite::Result<Memory> {
    let kind: String = row.get(2)?;
    let entities_json: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    Ok(Memory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: MemoryKind::parse(&kind).unwrap_or(MemoryKind::DomainKnowledge),
        tier,
        content: row.get(3)?,
        summary: row.get(4)?,
        relevance,
        importance: row.get(5)?,
        entities: serde_json::from_str(&entities_json).unwrap_or_default(),
        token_count: row.get::<_, i64>(7)? as u32,
        reasons: Vec::new(),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
