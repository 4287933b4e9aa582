//! Request types and input validation.
//!
//! Validation happens before anything is spawned. The typed constructors
//! cover callers inside the crate; [`MessageRequest::from_json`] covers
//! loosely typed input such as an HTTP body, where a message may be missing
//! or not a string at all.

use std::time::Duration;

use serde_json::Value;

use crate::cli::ClaudeCommand;

use super::MessengerError;

/// Deadline applied when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Optional per-call settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Session to continue.
    pub session_id: Option<String>,
    /// Deadline for the whole call.
    pub timeout: Option<Duration>,
}

impl SendOptions {
    /// Continue an existing session.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the deadline.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse options from a JSON value.
    ///
    /// `null` means "no options". Accepts `sessionId`/`session_id` and
    /// `timeoutMs`/`timeout` (milliseconds).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the value is not an object or a field has
    /// the wrong type.
    pub fn from_json(value: &Value) -> Result<Self, MessengerError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err(MessengerError::invalid("Options must be an object")),
        };

        let timeout = match first_present(map, &["timeoutMs", "timeout"]) {
            None => None,
            Some(Value::Number(number)) => {
                let millis = number
                    .as_u64()
                    .ok_or_else(|| MessengerError::invalid("Timeout must be a positive integer"))?;
                Some(Duration::from_millis(millis))
            }
            Some(_) => return Err(MessengerError::invalid("Timeout must be a number")),
        };

        let session_id = match first_present(map, &["sessionId", "session_id"]) {
            None => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(MessengerError::invalid("Session ID must be a string")),
        };

        Ok(Self {
            session_id,
            timeout,
        })
    }
}

fn first_present<'a>(map: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

/// A validated request for one CLI call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRequest {
    message: String,
    session_id: Option<String>,
    timeout: Option<Duration>,
}

impl MessageRequest {
    /// Create a request with default options.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the message is empty after trimming.
    pub fn new(message: impl Into<String>) -> Result<Self, MessengerError> {
        Self::with_options(message, SendOptions::default())
    }

    /// Create a request with explicit options.
    ///
    /// An empty session id is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the message is empty after trimming or
    /// the timeout is zero.
    pub fn with_options(
        message: impl Into<String>,
        options: SendOptions,
    ) -> Result<Self, MessengerError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(MessengerError::invalid("Message cannot be empty"));
        }

        if options.timeout.is_some_and(|t| t.is_zero()) {
            return Err(MessengerError::invalid("Timeout must be a positive integer"));
        }

        Ok(Self {
            message,
            session_id: options.session_id.filter(|id| !id.is_empty()),
            timeout: options.timeout,
        })
    }

    /// Build a request from loosely typed JSON input.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the message is absent, not a string or
    /// blank, or if the options are malformed.
    pub fn from_json(message: Option<&Value>, options: Option<&Value>) -> Result<Self, MessengerError> {
        let message = match message {
            None | Some(Value::Null) => return Err(MessengerError::invalid("Message is required")),
            Some(Value::String(text)) => text,
            Some(_) => return Err(MessengerError::invalid("Message must be a string")),
        };

        let options = options.map_or_else(|| Ok(SendOptions::default()), SendOptions::from_json)?;
        Self::with_options(message.as_str(), options)
    }

    /// The raw message text, untrimmed.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Session to continue, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Caller-supplied deadline, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Deadline for this call, falling back to `default`.
    #[must_use]
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// The CLI invocation for this request.
    #[must_use]
    pub fn command(&self) -> ClaudeCommand {
        let command = ClaudeCommand::new(self.message.as_str());
        match &self.session_id {
            Some(id) => command.session_id(id.as_str()),
            None => command,
        }
    }
}
