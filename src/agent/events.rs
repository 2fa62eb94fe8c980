//! Events emitted by an agent backend during a turn.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Tool name the backend invokes to ask the requester a clarifying question.
pub const ASK_QUESTION_TOOL: &str = "AskUserQuestion";
/// Tool name the backend invokes when a plan is ready for approval.
pub const EXIT_PLAN_TOOL: &str = "ExitPlanMode";

/// Token usage reported by the terminal result event.
///
/// Every field defaults to zero when absent from the wire.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnUsage {
    /// Base input tokens.
    #[serde(default)]
    pub input_tokens: i64,
    /// Tokens spent creating prompt-cache entries.
    #[serde(default)]
    pub cache_creation_input_tokens: i64,
    /// Tokens read from the prompt cache.
    #[serde(default)]
    pub cache_read_input_tokens: i64,
    /// Output tokens.
    #[serde(default)]
    pub output_tokens: i64,
}

/// Terminal result event carrying usage and total cost for the turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultEvent {
    /// Token usage breakdown.
    #[serde(default)]
    pub usage: TurnUsage,
    /// Total cost, accepted as either a JSON number or a decimal string.
    #[serde(default, deserialize_with = "deserialize_cost")]
    pub total_cost: Option<Decimal>,
}

/// Finalized per-turn accounting values, written once to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnMetrics {
    /// Effective input tokens: base + cache-creation + cache-read.
    pub input_tokens: i64,
    /// Output tokens.
    pub output_tokens: i64,
    /// Turn cost; zero when the result carries none.
    pub cost: Decimal,
}

impl ResultEvent {
    /// Collapse the result into the values the ledger stores.
    #[must_use]
    pub fn metrics(&self) -> TurnMetrics {
        TurnMetrics {
            input_tokens: self.usage.input_tokens
                + self.usage.cache_creation_input_tokens
                + self.usage.cache_read_input_tokens,
            output_tokens: self.usage.output_tokens,
            cost: self.total_cost.unwrap_or_default(),
        }
    }
}

/// One event in a backend's turn stream, tagged on the wire as `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Plain narrative text content.
    Text {
        /// The text chunk.
        text: String,
    },
    /// A tool invocation; suspend points are specific tool names.
    ToolUse {
        /// Tool name.
        name: String,
        /// Raw tool input.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Terminal result; feeds metric finalization only.
    Result(ResultEvent),
}

/// Accept a cost encoded as a JSON number or string, preserving decimal
/// precision either way (numbers go through their literal text form).
fn deserialize_cost<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Decimal::from_str(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(serde_json::Value::Number(number)) => Decimal::from_str(&number.to_string())
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "unsupported cost value: {other}"
        ))),
    }
}
