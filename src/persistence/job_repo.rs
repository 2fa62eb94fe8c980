//! Job repository for `SQLite` persistence.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for job aggregate records.
#[derive(Clone)]
pub struct JobRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    external_task_id: Option<String>,
    project_id: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    total_input_tokens: i64,
    total_output_tokens: i64,
    total_cost: String,
    total_sessions: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        Ok(Job {
            id: parse_uuid(&self.id)?,
            external_task_id: self.external_task_id,
            project_id: self.project_id,
            status: parse_status(&self.status)?,
            created_at: parse_timestamp(&self.created_at)?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_cost: parse_cost(&self.total_cost)?,
            total_sessions: self.total_sessions,
        })
    }
}

fn parse_status(s: &str) -> Result<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(AppError::Db(format!("invalid job status: {other}"))),
    }
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

pub(super) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Db(format!("invalid uuid: {e}")))
}

pub(super) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid timestamp: {e}")))
}

pub(super) fn parse_cost(s: &str) -> Result<Decimal> {
    Decimal::from_str(s).map_err(|e| AppError::Db(format!("invalid cost: {e}")))
}

impl JobRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new job record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn create(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs (id, external_task_id, project_id, status, created_at,
                               completed_at, total_input_tokens, total_output_tokens,
                               total_cost, total_sessions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(job.id.to_string())
        .bind(&job.external_task_id)
        .bind(&job.project_id)
        .bind(status_str(job.status))
        .bind(job.created_at.to_rfc3339())
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(job.total_input_tokens)
        .bind(job.total_output_tokens)
        .bind(job.total_cost.to_string())
        .bind(job.total_sessions)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Retrieve a job by identifier; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a row is malformed.
    pub async fn get_by_id(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, external_task_id, project_id, status, created_at, completed_at,
                    total_input_tokens, total_output_tokens, total_cost, total_sessions
             FROM jobs WHERE id = ?1",
        )
        .bind(job_id.to_string())
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(JobRow::into_job).transpose()
    }

    /// Update job status, stamping `completed_at` on terminal states.
    ///
    /// Transitions are one-directional; an invalid transition is a
    /// persistence error.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the job does not exist, or
    /// `AppError::Db` if the transition is invalid or the update fails.
    pub async fn update_status(&self, job_id: Uuid, status: JobStatus) -> Result<()> {
        let current = self
            .get_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
        if !current.can_transition_to(status) {
            return Err(AppError::Db(format!(
                "invalid job status transition: {:?} -> {status:?}",
                current.status
            )));
        }

        if status.is_terminal() {
            sqlx::query("UPDATE jobs SET status = ?1, completed_at = ?2 WHERE id = ?3")
                .bind(status_str(status))
                .bind(Utc::now().to_rfc3339())
                .bind(job_id.to_string())
                .execute(self.db.as_ref())
                .await?;
        } else {
            sqlx::query("UPDATE jobs SET status = ?1 WHERE id = ?2")
                .bind(status_str(status))
                .bind(job_id.to_string())
                .execute(self.db.as_ref())
                .await?;
        }
        Ok(())
    }

    /// Additively merge one turn's metrics into the job's running
    /// totals and increment its turn counter, as a single logical
    /// update.
    ///
    /// The decimal cost is summed in Rust inside a transaction so no
    /// floating-point drift enters the ledger.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the job does not exist, or
    /// `AppError::Db` on persistence failure.
    pub async fn increment_metrics(
        &self,
        job_id: Uuid,
        input_tokens: i64,
        output_tokens: i64,
        cost: Decimal,
    ) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let current_cost: Option<(String,)> =
            sqlx::query_as("SELECT total_cost FROM jobs WHERE id = ?1")
                .bind(job_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let (current_cost,) =
            current_cost.ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;
        let new_cost = parse_cost(&current_cost)? + cost;

        sqlx::query(
            "UPDATE jobs SET
                 total_input_tokens = total_input_tokens + ?1,
                 total_output_tokens = total_output_tokens + ?2,
                 total_cost = ?3,
                 total_sessions = total_sessions + 1
             WHERE id = ?4",
        )
        .bind(input_tokens)
        .bind(output_tokens)
        .bind(new_cost.to_string())
        .bind(job_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
