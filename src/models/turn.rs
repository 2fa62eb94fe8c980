//! Ledger record for a single execution turn.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ledger row per turn.
///
/// Written exactly once at turn start and finalized exactly once at
/// turn end (metrics + external session correlation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnRecord {
    /// Unique ledger row identifier.
    pub id: Uuid,
    /// Owning job identifier.
    pub job_id: Uuid,
    /// External session correlation id, captured once metadata is known.
    pub external_session_id: Option<String>,
    /// Turn start timestamp.
    pub started_at: DateTime<Utc>,
    /// Turn end timestamp, set at finalization.
    pub ended_at: Option<DateTime<Utc>>,
    /// Effective input tokens for this turn only.
    pub input_tokens: i64,
    /// Output tokens for this turn only.
    pub output_tokens: i64,
    /// Cost for this turn only (decimal currency).
    pub cost: Decimal,
}

impl TurnRecord {
    /// Construct a fresh ledger row for a turn starting now.
    #[must_use]
    pub fn new(job_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            external_session_id: None,
            started_at: Utc::now(),
            ended_at: None,
            input_tokens: 0,
            output_tokens: 0,
            cost: Decimal::ZERO,
        }
    }
}
