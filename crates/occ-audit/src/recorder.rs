use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AdminAuditEntry, TierCounts, UsageRecord};

/// Records prompt-usage, tool-call, and outcome data (§4.M). Writes are
/// best-effort from the pipeline's point of view: a failure here is logged
/// and the turn proceeds rather than being aborted.
pub struct AuditRecorder {
    db: Mutex<Connection>,
}

impl AuditRecorder {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self), fields(session_id, user_id, tokens_in, tokens_out))]
    #[allow(clippy::too_many_arguments)]
    pub fn record_usage(
        &self,
        session_id: &str,
        user_id: &str,
        templates_applied: Vec<String>,
        techniques: Vec<String>,
        tier_counts: TierCounts,
        injected_sources: Vec<String>,
        tokens_in: u32,
        tokens_out: u32,
    ) -> Result<UsageRecord> {
        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        db.execute(
            "INSERT INTO usage_records
                (id, session_id, user_id, templates_applied, techniques, tier_counts,
                 injected_sources, tokens_in, tokens_out, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                session_id,
                user_id,
                serde_json::to_string(&templates_applied).unwrap(),
                serde_json::to_string(&techniques).unwrap(),
                serde_json::to_string(&tier_counts).unwrap(),
                serde_json::to_string(&injected_sources).unwrap(),
                tokens_in,
                tokens_out,
                now,
            ],
        )?;

        Ok(UsageRecord {
            id,
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            templates_applied,
            techniques,
            tier_counts,
            injected_sources,
            tokens_in,
            tokens_out,
            created_at: now,
        })
    }

    /// Same as `record_usage` but swallows any failure after logging it, so
    /// a recorder outage never aborts a turn (§4.M).
    #[allow(clippy::too_many_arguments)]
    pub fn record_usage_best_effort(
        &self,
        session_id: &str,
        user_id: &str,
        templates_applied: Vec<String>,
        techniques: Vec<String>,
        tier_counts: TierCounts,
        injected_sources: Vec<String>,
        tokens_in: u32,
        tokens_out: u32,
    ) {
        if let Err(e) = self.record_usage(
            session_id,
            user_id,
            templates_applied,
            techniques,
            tier_counts,
            injected_sources,
            tokens_in,
            tokens_out,
        ) {
            error!(error = %e, session_id, "failed to record usage; turn proceeds anyway");
        }
    }

    #[instrument(skip(self, details), fields(admin_user_id, action))]
    pub fn record_admin_action(
        &self,
        admin_user_id: &str,
        action: &str,
        target: Option<&str>,
        details: serde_json::Value,
    ) -> Result<AdminAuditEntry> {
        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO admin_audit_log (id, admin_user_id, action, target, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, admin_user_id, action, target, details.to_string(), now],
        )?;
        Ok(AdminAuditEntry {
            id,
            admin_user_id: admin_user_id.to_string(),
            action: action.to_string(),
            target: target.map(str::to_string),
            details,
            created_at: now,
        })
    }

    pub fn list_usage_for_session(&self, session_id: &str) -> Result<Vec<UsageRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, user_id, templates_applied, techniques, tier_counts,
                    injected_sources, tokens_in, tokens_out, created_at
             FROM usage_records WHERE session_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_usage)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_usage(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    let templates: String = row.get(3)?;
    let techniques: String = row.get(4)?;
    let tier_counts: String = row.get(5)?;
    let injected: String = row.get(6)?;
    Ok(UsageRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        templates_applied: serde_json::from_str(&templates).unwrap_or_default(),
        techniques: serde_json::from_str(&techniques).unwrap_or_default(),
        tier_counts: serde_json::from_str(&tier_counts).unwrap_or_default(),
        injected_sources: serde_json::from_str(&injected).unwrap_or_default(),
        tokens_in: row.get::<_, i64>(7)? as u32,
        tokens_out: row.get::<_, i64>(8)? as u32,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    fn recorder() -> AuditRecorder {
        AuditRecorder::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn record_usage_round_trips_through_list() {
        let rec = recorder();
        let tiers = TierCounts { tier1: 4, tier2: 2, tier3: 1 };
        let saved = rec
            .record_usage(
                "s1",
                "u1",
                vec!["support_default".into()],
                vec!["retrieval_augmentation".into()],
                tiers,
                vec!["memory".into(), "retrieval".into()],
                1200,
                340,
            )
            .unwrap();

        let listed = rec.list_usage_for_session("s1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].tier_counts.tier1, 4);
        assert_eq!(listed[0].injected_sources, vec!["memory", "retrieval"]);
        assert_eq!(listed[0].tokens_in, 1200);
    }

    #[test]
    fn list_usage_for_session_is_scoped_and_ordered() {
        let rec = recorder();
        rec.record_usage("s1", "u1", vec![], vec![], TierCounts::default(), vec![], 10, 5)
            .unwrap();
        rec.record_usage("s2", "u1", vec![], vec![], TierCounts::default(), vec![], 20, 8)
            .unwrap();
        rec.record_usage("s1", "u1", vec![], vec![], TierCounts::default(), vec![], 30, 12)
            .unwrap();

        let listed = rec.list_usage_for_session("s1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].tokens_in, 10);
        assert_eq!(listed[1].tokens_in, 30);
    }

    #[test]
    fn record_usage_best_effort_never_panics() {
        let rec = recorder();
        rec.record_usage_best_effort(
            "s1",
            "u1",
            vec![],
            vec![],
            TierCounts::default(),
            vec![],
            0,
            0,
        );
        assert_eq!(rec.list_usage_for_session("s1").unwrap().len(), 1);
    }

    #[test]
    fn record_admin_action_round_trips() {
        let rec = recorder();
        let entry = rec
            .record_admin_action(
                "admin-1",
                "approve_access_request",
                Some("req-42"),
                serde_json::json!({"note": "approved per policy"}),
            )
            .unwrap();
        assert_eq!(entry.admin_user_id, "admin-1");
        assert_eq!(entry.action, "approve_access_request");
        assert_eq!(entry.target.as_deref(), Some("req-42"));
    }
}
