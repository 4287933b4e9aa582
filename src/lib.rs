//! Claude Relay - Chat messages relayed to the Claude CLI.

pub mod cli;
pub mod config;
pub mod display;
pub mod messenger;
pub mod server;
