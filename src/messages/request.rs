//! Work-request and cancellation wire messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::session::PermissionMode;

/// Originating client/channel for a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientType {
    /// Interactive chat client.
    #[serde(rename = "bot")]
    Bot,
    /// Automated task-manager client.
    #[serde(rename = "taskmanager")]
    TaskManager,
}

impl ClientType {
    /// Routing-key segment for this client type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::TaskManager => "taskmanager",
        }
    }
}

/// A natural-language work request driving one execution turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkRequest {
    /// Unique request identifier; duplicate deliveries carry the same id.
    pub request_id: String,
    /// Originating client.
    pub client_type: ClientType,
    /// Requester identifier within the client.
    pub user_id: i64,
    /// Owning project identifier.
    pub project_id: String,
    /// Working directory for the agent.
    pub project_path: String,
    /// Prompt text submitted by the requester.
    pub prompt: String,
    /// Permission mode passed through to the backend.
    #[serde(default)]
    pub permission_mode: PermissionMode,
    /// Resume token of a previously suspended turn, if continuing one.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Owning job, if the requester knows it.
    #[serde(default)]
    pub job_id: Option<Uuid>,
    /// Answers keyed by question id; presence signals a resumption.
    ///
    /// A `serde_json::Map` keeps the document's key order, which the
    /// synthesized prompt must preserve.
    #[serde(default)]
    pub answer_to_question: Option<serde_json::Map<String, serde_json::Value>>,
    /// Submission timestamp.
    pub timestamp: DateTime<Utc>,
}

impl WorkRequest {
    /// Build the effective prompt for the turn.
    ///
    /// The request's prompt verbatim, unless an answer map is present,
    /// in which case one `"<question-id>: <answer-text>"` line per
    /// entry is emitted, newline-joined, in map order.
    #[must_use]
    pub fn effective_prompt(&self) -> String {
        match &self.answer_to_question {
            Some(answers) if !answers.is_empty() => answers
                .iter()
                .map(|(question_id, answer)| {
                    let text = answer
                        .as_str()
                        .map_or_else(|| answer.to_string(), str::to_owned);
                    format!("{question_id}: {text}")
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => self.prompt.clone(),
        }
    }
}

/// A fire-and-forget cancellation for a project's active session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StopRequest {
    /// Requester identifier within the client.
    pub user_id: i64,
    /// Project whose active session should be interrupted.
    pub project_id: String,
}
