//! Structured reply parsed from the CLI's standard output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::MalformedReason;

/// Reply produced by a successful call.
///
/// Keys other than `response`, `session_id` and `metadata` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeResponse {
    /// Text of the reply.
    pub response: String,
    /// Session the reply belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Free-form metadata reported by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ClaudeResponse {
    /// Create a response with only the text set.
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            session_id: None,
            metadata: None,
        }
    }

    /// Parse the complete standard output of a finished process.
    ///
    /// # Errors
    ///
    /// Returns a [`MalformedReason`] if the text is not a JSON object with a
    /// non-null `response` string.
    pub fn parse(stdout: &str) -> Result<Self, MalformedReason> {
        let value: Value = serde_json::from_str(stdout).map_err(MalformedReason::InvalidJson)?;

        let Value::Object(map) = value else {
            return Err(MalformedReason::NotAnObject);
        };

        if map.get("response").map_or(true, Value::is_null) {
            return Err(MalformedReason::MissingResponseField);
        }

        serde_json::from_value(Value::Object(map)).map_err(MalformedReason::UnexpectedShape)
    }
}
