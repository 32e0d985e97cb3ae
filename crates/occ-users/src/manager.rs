use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use crate::apikey::{generate_key, hash_key, verify_key};
use crate::error::{Result, UserError};
use crate::types::{ApiKeyRecord, RateLimitTier, RateLimits, User};

/// Owns Users and issued API keys (§3 `User`, §6 "API-key format").
pub struct UserManager {
    db: Mutex<Connection>,
}

impl UserManager {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn create_or_get(&self, user_id: &str) -> Result<User> {
        if let Some(user) = self.get(user_id)? {
            return Ok(user);
        }
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT OR IGNORE INTO users (id, groups, is_admin, created_at) VALUES (?1, '[]', 0, ?2)",
            params![user_id, now],
        )?;
        drop(db);
        self.get(user_id)?.ok_or_else(|| UserError::NotFound(user_id.to_string()))
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn get(&self, user_id: &str) -> Result<Option<User>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, groups, is_admin, created_at FROM users WHERE id = ?1",
            params![user_id],
            row_to_user,
        ) {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(UserError::Database(e)),
        }
    }

    #[instrument(skip(self), fields(user_id, is_admin))]
    pub fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE users SET is_admin = ?1 WHERE id = ?2",
            params![is_admin as i64, user_id],
        )?;
        if n == 0 {
            return Err(UserError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    /// Issues a new API key. Returns the plaintext once; only the hash is
    /// persisted (§6).
    #[instrument(skip(self), fields(user_id, system))]
    pub fn issue_api_key(
        &self,
        user_id: &str,
        system: bool,
        tier: RateLimitTier,
        custom_limits: Option<RateLimits>,
    ) -> Result<(String, ApiKeyRecord)> {
        let (plaintext, prefix) = generate_key(system);
        let hash = hash_key(&plaintext)?;

        let db = self.db.lock().unwrap();
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let tier_str = tier_to_str(tier);
        let limits_json = custom_limits.map(|l| serde_json::to_string(&l).unwrap());

        db.execute(
            "INSERT INTO api_keys (id, user_id, prefix, key_hash, tier, custom_limits, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![id, user_id, prefix, hash, tier_str, limits_json, now],
        )?;

        Ok((
            plaintext,
            ApiKeyRecord {
                id,
                user_id: user_id.to_string(),
                prefix,
                tier,
                custom_limits,
                active: true,
                created_at: now,
            },
        ))
    }

    /// Verifies a presented plaintext API key and returns its record if
    /// active. Hashes for the key's user are checked individually since
    /// the prefix alone does not identify a row.
    #[instrument(skip(self, plaintext))]
    pub fn verify_api_key(&self, plaintext: &str) -> Result<ApiKeyRecord> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, user_id, prefix, key_hash, tier, custom_limits, active, created_at
             FROM api_keys WHERE active = 1",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let hash: String = row.get(3)?;
            if verify_key(plaintext, &hash) {
                return Ok(row_to_api_key(row)?);
            }
        }
        Err(UserError::InvalidApiKey)
    }

    #[instrument(skip(self), fields(key_id))]
    pub fn revoke_api_key(&self, key_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("UPDATE api_keys SET active = 0 WHERE id = ?1", params![key_id])?;
        if n == 0 {
            return Err(UserError::NotFound(key_id.to_string()));
        }
        Ok(())
    }
}

fn tier_to_str(tier: RateLimitTier) -> &'static str {
    match tier {
        RateLimitTier::Standard => "standard",
        RateLimitTier::Elevated => "elevated",
        RateLimitTier::System => "system",
    }
}

fn str_to_tier(s: &str) -> RateLimitTier {
    match s {
        "elevated" => RateLimitTier::Elevated,
        "system" => RateLimitTier::System,
        _ => RateLimitTier::Standard,
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let groups_json: String = row.get(1)?;
    Ok(User {
        id: row.get(0)?,
        groups: serde_json::from_str(&groups_json).unwrap_or_default(),
        is_admin: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
    })
}

fn row_to_api_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let tier: String = row.get(4)?;
    let limits_json: Option<String> = row.get(5)?;
    Ok(ApiKeyRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        prefix: row.get(2)?,
        tier: str_to_tier(&tier),
        custom_limits: limits_json.and_then(|j| serde_json::from_str(&j).ok()),
        active: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}
