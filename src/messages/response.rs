//! Typed response events published back to requesters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::ClientType;

/// Kind-specific response payload, tagged on the wire as
/// `response_type`. Adding a variant without handling it everywhere is
/// a compile error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// Incremental narrative text from the agent.
    Text {
        /// The text chunk.
        text: String,
    },
    /// The agent suspended on a clarifying question.
    AskQuestion {
        /// Raw question objects as emitted by the backend tool.
        questions: Vec<serde_json::Value>,
    },
    /// The agent suspended with a plan awaiting approval.
    PlanReady {
        /// The plan produced by the agent.
        plan_content: String,
        /// Narrative text buffered during plan mode, as a fallback.
        accumulated_text: String,
    },
    /// The turn finished successfully.
    Completed,
    /// The turn failed; the message is user-visible.
    Error {
        /// Failure description.
        error_message: String,
    },
}

impl ResponsePayload {
    /// Routing-key segment for this response kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::AskQuestion { .. } => "ask_question",
            Self::PlanReady { .. } => "plan_ready",
            Self::Completed => "completed",
            Self::Error { .. } => "error",
        }
    }
}

/// Response event correlated to a work request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkResponse {
    /// Identifier of the originating request.
    pub request_id: String,
    /// Client the response is routed to.
    pub client_type: ClientType,
    /// Requester identifier within the client.
    pub user_id: i64,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub payload: ResponsePayload,
    /// Resume token (live session id) when the turn can be continued.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Publication timestamp.
    pub timestamp: DateTime<Utc>,
}

impl WorkResponse {
    /// Hierarchical routing key: `response.<client_type>.<response_type>`.
    #[must_use]
    pub fn routing_key(&self) -> String {
        format!(
            "response.{}.{}",
            self.client_type.as_str(),
            self.payload.kind()
        )
    }
}
