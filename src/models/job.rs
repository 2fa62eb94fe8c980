//! Job model: an aggregate unit of work spanning one or more turns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status for a job. Transitions are one-directional:
/// `Pending → Running → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet consumed by the orchestrator.
    Pending,
    /// At least one turn is executing.
    Running,
    /// Terminal: finished successfully.
    Completed,
    /// Terminal: a turn failed.
    Failed,
}

impl JobStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Aggregate unit of work with cumulative usage accounting.
///
/// Counters only ever increase; they are merged additively from each
/// turn's finalized metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,
    /// Optional external task correlation identifier.
    pub external_task_id: Option<String>,
    /// Owning project identifier.
    pub project_id: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Completion timestamp, set when a terminal status is reached.
    pub completed_at: Option<DateTime<Utc>>,
    /// Cumulative input tokens across all turns.
    pub total_input_tokens: i64,
    /// Cumulative output tokens across all turns.
    pub total_output_tokens: i64,
    /// Cumulative cost across all turns (decimal currency).
    pub total_cost: Decimal,
    /// Number of turns that have contributed metrics.
    pub total_sessions: i64,
}

impl Job {
    /// Construct a new pending job for a project.
    #[must_use]
    pub fn new(project_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_task_id: None,
            project_id,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_cost: Decimal::ZERO,
            total_sessions: 0,
        }
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self.status, next),
            (JobStatus::Pending, JobStatus::Running)
                | (
                    JobStatus::Pending | JobStatus::Running,
                    JobStatus::Completed | JobStatus::Failed
                )
                | (JobStatus::Running, JobStatus::Running)
        )
    }
}
