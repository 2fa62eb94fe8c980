//! Per-turn ledger repository for `SQLite` persistence.
//!
//! The table is named `sessions` on disk: each row records the
//! accounting for one turn's backend session.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::turn::TurnRecord;
use crate::Result;

use super::db::Database;
use super::job_repo::{parse_cost, parse_timestamp, parse_uuid};

/// Repository for per-turn ledger rows.
#[derive(Clone)]
pub struct TurnRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct TurnRow {
    id: String,
    job_id: String,
    external_session_id: Option<String>,
    started_at: String,
    ended_at: Option<String>,
    input_tokens: i64,
    output_tokens: i64,
    cost: String,
}

impl TurnRow {
    fn into_record(self) -> Result<TurnRecord> {
        Ok(TurnRecord {
            id: parse_uuid(&self.id)?,
            job_id: parse_uuid(&self.job_id)?,
            external_session_id: self.external_session_id,
            started_at: parse_timestamp(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_timestamp).transpose()?,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cost: parse_cost(&self.cost)?,
        })
    }
}

impl TurnRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a fresh ledger row at turn start. Written exactly once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, record: &TurnRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, job_id, external_session_id, started_at,
                                   ended_at, input_tokens, output_tokens, cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(record.id.to_string())
        .bind(record.job_id.to_string())
        .bind(&record.external_session_id)
        .bind(record.started_at.to_rfc3339())
        .bind(record.ended_at.map(|t| t.to_rfc3339()))
        .bind(record.input_tokens)
        .bind(record.output_tokens)
        .bind(record.cost.to_string())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Retrieve a ledger row by identifier; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a row is malformed.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<TurnRecord>> {
        let row: Option<TurnRow> = sqlx::query_as(
            "SELECT id, job_id, external_session_id, started_at, ended_at,
                    input_tokens, output_tokens, cost
             FROM sessions WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(TurnRow::into_record).transpose()
    }

    /// Finalize the row at turn end: metrics, end timestamp, and the
    /// external session correlation id. Updated exactly once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn finalize(
        &self,
        id: Uuid,
        external_session_id: &str,
        input_tokens: i64,
        output_tokens: i64,
        cost: Decimal,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET
                 external_session_id = ?1,
                 ended_at = ?2,
                 input_tokens = ?3,
                 output_tokens = ?4,
                 cost = ?5
             WHERE id = ?6",
        )
        .bind(external_session_id)
        .bind(Utc::now().to_rfc3339())
        .bind(input_tokens)
        .bind(output_tokens)
        .bind(cost.to_string())
        .bind(id.to_string())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
