//! Colored CLI display utilities for relay output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal when messages are sent from the command line.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};

use crate::messenger::{ClaudeResponse, MessengerError};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format response metadata for display, truncating long values.
#[must_use]
pub fn format_metadata(metadata: &Map<String, Value>, raw_mode: bool) -> String {
    metadata
        .iter()
        .map(|(k, v)| {
            let value_str = match v {
                Value::String(s) => truncate(s, 50, raw_mode),
                other => truncate(&other.to_string(), 50, raw_mode),
            };
            format!("{k}={value_str}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print the outgoing message.
pub fn print_request(message: &str, session_id: Option<&str>, raw_mode: bool) {
    let session = session_id.map_or_else(String::new, |id| format!(" session={id}"));
    println!(
        "{} {} {}{}",
        timestamp().dimmed(),
        "[SEND]".blue().bold(),
        truncate(message, DEFAULT_MAX_LEN, raw_mode),
        session.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a reply: header line, the response text, then metadata if any.
pub fn print_reply(reply: &ClaudeResponse, raw_mode: bool) {
    match &reply.session_id {
        Some(id) => println!(
            "{} {} session={}",
            timestamp().dimmed(),
            "[REPLY]".green().bold(),
            truncate(id, 20, raw_mode).cyan()
        ),
        None => println!("{} {}", timestamp().dimmed(), "[REPLY]".green().bold()),
    }
    println!("{}", reply.response);

    if let Some(metadata) = reply.metadata.as_ref().filter(|m| !m.is_empty()) {
        println!(
            "{} {}",
            "[META]".magenta().bold(),
            format_metadata(metadata, raw_mode).dimmed()
        );
    }
    let _ = io::stdout().flush();
}

/// Print a failed call to stderr.
pub fn print_error(error: &MessengerError) {
    eprintln!(
        "{} {} {}",
        "[ERROR]".red().bold(),
        format!("({})", error.kind()).dimmed(),
        error
    );
    let _ = io::stderr().flush();
}

/// Print the address the server listens on.
pub fn print_listening(address: &str) {
    println!(
        "{} {} listening on {}",
        timestamp().dimmed(),
        "[SERVER]".yellow().bold(),
        address.cyan()
    );
    let _ = io::stdout().flush();
}
