//! Request dedupe ledger.
//!
//! Delivery from the bus is at-least-once; marking each request id on
//! first sight lets the orchestrator skip a redelivered duplicate
//! instead of double-counting its turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Result;

use super::db::Database;

/// Repository recording which request ids have been processed.
#[derive(Clone)]
pub struct DedupeRepo {
    db: Arc<Database>,
}

impl DedupeRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark a request id as processed. Returns `true` on first sight,
    /// `false` when the id was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn mark_processed(&self, request_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO processed_request (request_id, processed_at)
             VALUES (?1, ?2)",
        )
        .bind(request_id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Purge request ids recorded before `before`. Returns the number
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` on persistence failure.
    pub async fn purge(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processed_request WHERE processed_at < ?1")
            .bind(before.to_rfc3339())
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
