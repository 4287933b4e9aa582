//! CLI module for Claude CLI process spawning and control.

mod process;

pub use process::*;
