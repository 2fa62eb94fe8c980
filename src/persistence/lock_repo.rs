//! Per-project advisory lock with TTL.
//!
//! Set-if-absent semantics over an `advisory_lock` table: an acquire
//! first reclaims an expired row for the key, then attempts an
//! `INSERT OR IGNORE`. Keys follow the `lock:<project_id>` contract.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::Result;

use super::db::Database;

/// Repository implementing the advisory lock protocol.
#[derive(Clone)]
pub struct ProjectLockRepo {
    db: Arc<Database>,
}

fn lock_key(project_id: &str) -> String {
    format!("lock:{project_id}")
}

impl ProjectLockRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Try to acquire the lock for a project. Returns `false` when the
    /// lock is already held and not expired.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn acquire(&self, project_id: &str, ttl: Duration) -> Result<bool> {
        let key = lock_key(project_id);
        let now = Utc::now();
        let expires = now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        sqlx::query("DELETE FROM advisory_lock WHERE key = ?1 AND expires_at <= ?2")
            .bind(&key)
            .bind(now.to_rfc3339())
            .execute(self.db.as_ref())
            .await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO advisory_lock (key, acquired_at, expires_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(&key)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release the lock for a project. Releasing an unheld lock is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn release(&self, project_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM advisory_lock WHERE key = ?1")
            .bind(lock_key(project_id))
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Extend a held lock's TTL. Returns `false` when the lock is not
    /// currently held.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn extend(&self, project_id: &str, ttl: Duration) -> Result<bool> {
        let expires = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let result = sqlx::query("UPDATE advisory_lock SET expires_at = ?1 WHERE key = ?2")
            .bind(expires.to_rfc3339())
            .bind(lock_key(project_id))
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Whether a non-expired lock currently exists for the project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn is_locked(&self, project_id: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT key FROM advisory_lock WHERE key = ?1 AND expires_at > ?2")
                .bind(lock_key(project_id))
                .bind(Utc::now().to_rfc3339())
                .fetch_optional(self.db.as_ref())
                .await?;
        Ok(row.is_some())
    }

    /// Delete all expired lock rows. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM advisory_lock WHERE expires_at <= ?1")
            .bind(Utc::now().to_rfc3339())
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
