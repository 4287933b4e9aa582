//! Messenger error types.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::cli::{ProcessExit, SpawnError};

/// Classification of a failed call, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed caller input, rejected before anything is spawned.
    InvalidArgument,
    /// The executable could not be launched.
    SpawnFailure,
    /// The deadline elapsed before the process finished.
    Timeout,
    /// The process exited unsuccessfully.
    ProcessFailure,
    /// Standard output was not a usable response.
    MalformedResponse,
    /// The call was aborted by a messenger shutdown.
    Cancelled,
}

impl ErrorKind {
    /// Stable snake-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::SpawnFailure => "spawn_failure",
            Self::Timeout => "timeout",
            Self::ProcessFailure => "process_failure",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why standard output could not be turned into a response.
#[derive(thiserror::Error, Debug)]
pub enum MalformedReason {
    /// Output was not JSON at all.
    #[error("Invalid JSON response from Claude CLI: {0}")]
    InvalidJson(#[source] serde_json::Error),
    /// Output was JSON, but not an object.
    #[error("Invalid Claude CLI response: expected a JSON object")]
    NotAnObject,
    /// The `response` key was absent or null.
    #[error("Invalid Claude CLI response: missing response field")]
    MissingResponseField,
    /// A known key had the wrong type.
    #[error("Invalid Claude CLI response: {0}")]
    UnexpectedShape(#[source] serde_json::Error),
    /// Output grew past the configured limit.
    #[error("Invalid Claude CLI response: output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },
}

/// Errors produced by a single messenger call.
#[derive(thiserror::Error, Debug)]
pub enum MessengerError {
    /// Caller input was rejected.
    #[error("{0}")]
    InvalidArgument(String),

    /// The executable could not be launched.
    #[error("Failed to spawn Claude CLI process: {0}")]
    Spawn(#[from] SpawnError),

    /// The deadline elapsed first.
    #[error("Claude CLI request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The process exited unsuccessfully.
    #[error("{}", describe_failure(*.exit, .stderr))]
    ProcessFailure { exit: ProcessExit, stderr: String },

    /// Waiting on or reading from the process failed.
    #[error("Claude CLI process error: {0}")]
    ProcessIo(#[source] std::io::Error),

    /// Standard output was unusable.
    #[error(transparent)]
    MalformedResponse(#[from] MalformedReason),

    /// The messenger was shut down while the call was in flight.
    #[error("Claude CLI request was cancelled")]
    Cancelled,
}

impl MessengerError {
    /// Shorthand for an `InvalidArgument` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The kind tag of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Spawn(_) => ErrorKind::SpawnFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ProcessFailure { .. } | Self::ProcessIo(_) => ErrorKind::ProcessFailure,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

fn describe_failure(exit: ProcessExit, stderr: &str) -> String {
    if !stderr.is_empty() {
        return format!("Claude CLI error: {stderr}");
    }

    match exit {
        ProcessExit::Code(code) => format!("Claude CLI exited with code {code}"),
        ProcessExit::Signaled(Some(signal)) => {
            format!("Claude CLI terminated by signal {signal}")
        }
        ProcessExit::Signaled(None) => "Claude CLI terminated by a signal".to_string(),
    }
}
