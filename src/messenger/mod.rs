//! Relay of chat messages to the Claude CLI.
//!
//! A [`Messenger`] turns each validated [`MessageRequest`] into one child
//! process, accumulates its output and resolves the call exactly once with a
//! [`ClaudeResponse`] or a [`MessengerError`].

mod accumulator;
mod client;
mod error;
mod outcome;
mod registry;
mod request;
mod response;
mod spawner;

pub use accumulator::Accumulator;
pub use client::{Messenger, MessengerConfig, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TERMINATE_GRACE};
pub use error::{ErrorKind, MalformedReason, MessengerError};
pub use outcome::OutcomeSlot;
pub use registry::{CallRegistry, Registration};
pub use request::{MessageRequest, SendOptions, DEFAULT_TIMEOUT};
pub use response::ClaudeResponse;
pub use spawner::{ChildOutput, ChildProcess, ProcessSpawner, Spawner};
