use std::sync::{Arc, Mutex as StdMutex};

use dashmap::DashMap;
use rusqlite::{params, Connection};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{CredentialError, Result};
use crate::provider::IdentityProvider;
use crate::types::CredentialRecord;

/// Manages delegated credentials with single-flight refresh (§4.A, §5, P5).
///
/// Refresh for a given user id is single-flight: concurrent `get_or_refresh`
/// calls for the same user share one in-flight refresh and observe the same
/// outcome. This is implemented with one `tokio::sync::Mutex` per user id —
/// the second caller blocks on the lock, then re-reads the (now fresh) row
/// instead of issuing its own refresh.
pub struct CredentialStore {
    db: StdMutex<Connection>,
    provider: Arc<dyn IdentityProvider>,
    refresh_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl CredentialStore {
    pub fn new(conn: Connection, provider: Arc<dyn IdentityProvider>) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: StdMutex::new(conn),
            provider,
            refresh_locks: DashMap::new(),
        })
    }

    /// Returns the stored record and whether it is expired. Never refreshes.
    #[instrument(skip(self), fields(user_id))]
    pub fn get(&self, user_id: &str) -> Result<(CredentialRecord, bool)> {
        let record = self.read(user_id)?;
        let expired = !record.is_service_principal() && record.is_expired();
        Ok((record, expired))
    }

    /// Returns a non-expired record, refreshing exactly once on expiry.
    #[instrument(skip(self), fields(user_id))]
    pub async fn get_or_refresh(&self, user_id: &str) -> Result<CredentialRecord> {
        let record = self.read(user_id)?;

        if record.is_service_principal() || !record.is_expired() {
            return Ok(record);
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        // Re-read: another in-flight caller may have already refreshed while
        // we waited for the lock.
        let record = self.read(user_id)?;
        if !record.is_expired() {
            debug!(user_id, "credential refreshed by a concurrent caller");
            return Ok(record);
        }

        let refresh_token = record.refresh_token.clone().ok_or_else(|| {
            CredentialError::TokenExpiredNoRefresh {
                user_id: user_id.to_string(),
            }
        })?;

        let refreshed = self.provider.refresh(user_id, &refresh_token).await?;

        let new_refresh_token = refreshed.refresh_token.clone().unwrap_or(refresh_token);
        let updated = CredentialRecord {
            user_id: user_id.to_string(),
            access_token: refreshed.access_token,
            id_token: refreshed.id_token,
            refresh_token: Some(new_refresh_token),
            expires_at: refreshed.expires_at,
            scope: refreshed.scope,
            tenant_id: record.tenant_id,
        };

        self.write(&updated)?;
        info!(user_id, "credential refreshed");
        Ok(updated)
    }

    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    pub fn store(&self, record: &CredentialRecord) -> Result<()> {
        self.write(record)
    }

    #[instrument(skip(self), fields(user_id))]
    pub fn delete(&self, user_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM credentials WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    /// Remove expired rows older than `older_than` RFC3339 timestamp.
    #[instrument(skip(self))]
    pub fn sweep_expired(&self, older_than: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM credentials WHERE expires_at < ?1 AND refresh_token IS NOT 'service_principal'",
            params![older_than],
        )?;
        if n > 0 {
            warn!(count = n, "swept expired credential records");
        }
        Ok(n)
    }

    fn lock_for(&self, user_id: &str) -> Arc<AsyncMutex<()>> {
        self.refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn read(&self, user_id: &str) -> Result<CredentialRecord> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT user_id, access_token, id_token, refresh_token, expires_at, scope, tenant_id
             FROM credentials WHERE user_id = ?1",
            params![user_id],
            row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CredentialError::TokenMissing {
                user_id: user_id.to_string(),
            },
            other => CredentialError::Database(other),
        })
    }

    fn write(&self, record: &CredentialRecord) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO credentials
                (user_id, access_token, id_token, refresh_token, expires_at, scope, tenant_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                id_token = excluded.id_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                tenant_id = excluded.tenant_id,
                updated_at = excluded.updated_at",
            params![
                record.user_id,
                record.access_token,
                record.id_token,
                record.refresh_token,
                record.expires_at.to_rfc3339(),
                record.scope,
                record.tenant_id,
                now,
            ],
        )?;
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<CredentialRecord> {
    let expires_at: String = row.get(4)?;
    Ok(CredentialRecord {
        user_id: row.get(0)?,
        access_token: row.get(1)?,
        id_token: row.get(2)?,
        refresh_token: row.get(3)?,
        expires_at: chrono::DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        scope: row.get(5)?,
        tenant_id: row.get(6)?,
    })
}
