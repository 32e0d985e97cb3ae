use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use crate::error::{PromptError, Result};
use crate::types::{Template, TemplateStats};

/// CRUD and assignment storage backing the router (§4.G contract: CRUD over
/// templates, `Assign`, `GetStats`).
pub struct TemplateRepository {
    db: Mutex<Connection>,
}

impl TemplateRepository {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, template))]
    pub fn create(&self, template: &Template) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO prompt_templates
                (id, name, content, category, triggers, allowed_groups, is_default, is_active, model_preferences, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                template.id,
                template.name,
                template.content,
                template.category,
                serde_json::to_string(&template.triggers).unwrap(),
                serde_json::to_string(&template.allowed_groups).unwrap(),
                template.is_default as i64,
                template.is_active as i64,
                serde_json::to_string(&template.model_preferences).unwrap(),
                now,
            ],
        )?;
        db.execute(
            "INSERT OR IGNORE INTO prompt_selection_log (template_id, count) VALUES (?1, 0)",
            params![template.id],
        )?;
        Ok(())
    }

    #[instrument(skip(self, template))]
    pub fn update(&self, template: &Template) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let changed = db.execute(
            "UPDATE prompt_templates SET
                name = ?2, content = ?3, category = ?4, triggers = ?5, allowed_groups = ?6,
                is_default = ?7, is_active = ?8, model_preferences = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                template.id,
                template.name,
                template.content,
                template.category,
                serde_json::to_string(&template.triggers).unwrap(),
                serde_json::to_string(&template.allowed_groups).unwrap(),
                template.is_default as i64,
                template.is_active as i64,
                serde_json::to_string(&template.model_preferences).unwrap(),
                now,
            ],
        )?;
        if changed == 0 {
            return Err(PromptError::NotFound(template.id.clone()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete(&self, template_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM prompt_templates WHERE id = ?1", params![template_id])?;
        db.execute("DELETE FROM prompt_selection_log WHERE template_id = ?1", params![template_id])?;
        db.execute("DELETE FROM prompt_assignments WHERE template_id = ?1", params![template_id])?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get(&self, template_id: &str) -> Result<Template> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT * FROM prompt_templates WHERE id = ?1",
            params![template_id],
            row_to_template,
        )
        .optional()?
        .ok_or_else(|| PromptError::NotFound(template_id.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Template>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT * FROM prompt_templates ORDER BY name")?;
        let rows = stmt.query_map([], row_to_template)?;
        rows.collect::<std::result::Result<_, _>>().map_err(Into::into)
    }

    pub fn get_default(&self) -> Result<Template> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT * FROM prompt_templates WHERE is_default = 1 AND is_active = 1 LIMIT 1",
            [],
            row_to_template,
        )
        .optional()?
        .ok_or(PromptError::NoDefault)
    }

    #[instrument(skip(self))]
    pub fn assign(&self, user_id: &str, template_id: &str, by: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO prompt_assignments (user_id, template_id, assigned_by, assigned_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                template_id = excluded.template_id,
                assigned_by = excluded.assigned_by,
                assigned_at = excluded.assigned_at",
            params![user_id, template_id, by, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn assignment_for(&self, user_id: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        Ok(db
            .query_row(
                "SELECT template_id FROM prompt_assignments WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn record_selection(&self, template_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO prompt_selection_log (template_id, count) VALUES (?1, 1)
             ON CONFLICT(template_id) DO UPDATE SET count = count + 1",
            params![template_id],
        )?;
        Ok(())
    }

    pub fn get_stats(&self) -> Result<Vec<TemplateStats>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT t.id,
                    COALESCE(l.count, 0),
                    (SELECT COUNT(*) FROM prompt_assignments a WHERE a.template_id = t.id)
             FROM prompt_templates t
             LEFT JOIN prompt_selection_log l ON l.template_id = t.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TemplateStats {
                template_id: row.get(0)?,
                selections: row.get::<_, i64>(1)? as u64,
                assignments: row.get::<_, i64>(2)? as u64,
            })
        })?;
        rows.collect::<std::result::Result<_, _>>().map_err(Into::into)
    }
}

fn row_to_template(row: &Row) -> rusqlite::Result<Template> {
    let triggers: String = row.get("triggers")?;
    let allowed_groups: String = row.get("allowed_groups")?;
    let model_preferences: String = row.get("model_preferences")?;
    Ok(Template {
        id: row.get("id")?,
        name: row.get("name")?,
        content: row.get("content")?,
        category: row.get("category")?,
        triggers: serde_json::from_str(&triggers).unwrap_or_default(),
        allowed_groups: serde_json::from_str(&allowed_groups).unwrap_or_default(),
        is_default: row.get::<_, i64>("is_default")? != 0,
        is_active: row.get::<_, i64>("is_active")? != 0,
        model_preferences: serde_json::from_str(&model_preferences).unwrap_or_default(),
    })
}
