//! Paused-turn correlation records.
//!
//! A suspended turn is a continuation encoded by its live session id.
//! This table durably maps that resume token back to the owning job so
//! a follow-up request can recover the job id without carrying it, and
//! so a paused turn survives a process restart.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::Result;

use super::db::Database;
use super::job_repo::parse_uuid;

/// Repository for paused-turn session-to-job correlation.
#[derive(Clone)]
pub struct PausedTurnRepo {
    db: Arc<Database>,
}

impl PausedTurnRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record that `session_id` is a suspended turn owned by `job_id`.
    /// Re-suspending the same session refreshes the record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn save(&self, session_id: &str, job_id: Uuid, ttl: Duration) -> Result<()> {
        let now = Utc::now();
        let expires = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        sqlx::query(
            "INSERT OR REPLACE INTO paused_turn (session_id, job_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(job_id.to_string())
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Look up the owning job for a suspended session; `None` when the
    /// record is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn job_for_session(&self, session_id: &str) -> Result<Option<Uuid>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT job_id FROM paused_turn WHERE session_id = ?1 AND expires_at > ?2",
        )
        .bind(session_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(|(job_id,)| parse_uuid(&job_id)).transpose()
    }

    /// Delete all expired records. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM paused_turn WHERE expires_at <= ?1")
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
