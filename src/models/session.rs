//! Live execution-session model and permission modes.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status for a live agent execution session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session actively streaming a turn.
    Active,
    /// Session paused at a suspend point.
    Paused,
    /// Session closed after its turn ended.
    Completed,
    /// Session cooperatively interrupted by a cancellation.
    Interrupted,
    /// Session ended with an execution failure.
    Failed,
}

/// Policy controlling whether the agent may mutate the workspace.
///
/// The value passes through to the backend unchanged; no semantic
/// interpretation happens at this layer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionMode {
    /// Agent must ask before mutating.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Agent may apply edits automatically.
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    /// Agent must not mutate; it may only produce a plan.
    #[serde(rename = "plan")]
    Plan,
}

impl PermissionMode {
    /// Wire/backend representation of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
        }
    }
}

/// Live agent execution session tracked by the in-process registry.
///
/// Metadata entries persist in the registry for the process lifetime;
/// only the live backend handle is released on close.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionSession {
    /// Opaque session identifier, also used as the resume token.
    pub id: String,
    /// Owning project identifier.
    pub project_id: String,
    /// Optional external task correlation identifier.
    pub task_id: Option<String>,
    /// Directory the agent operates in.
    pub working_directory: PathBuf,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session was closed, if it has been.
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionSession {
    /// Construct a new active session with a generated identifier.
    #[must_use]
    pub fn new(project_id: String, working_directory: PathBuf, task_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            task_id,
            working_directory,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }
}
