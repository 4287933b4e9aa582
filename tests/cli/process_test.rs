//! Tests for Claude process spawning and control.

use std::time::Duration;

use claude_relay::cli::{ClaudeCommand, ClaudeProcess, ProcessExit, SpawnError};
use claude_relay::messenger::ChildProcess;
use tokio::io::{AsyncBufReadExt, BufReader};

#[test]
fn command_new_builds_json_args() {
    let command = ClaudeCommand::new("Fix the bug");
    let args = command.build_args();

    assert_eq!(args, vec!["--output-format", "json", "Fix the bug"]);
}

#[test]
fn command_session_id_precedes_message() {
    let command = ClaudeCommand::new("continue").session_id("session_abc123");
    let args = command.build_args();

    assert_eq!(
        args,
        vec![
            "--output-format",
            "json",
            "--session-id",
            "session_abc123",
            "continue"
        ]
    );
    assert_eq!(command.get_session_id(), Some("session_abc123"));
}

#[test]
fn command_message_starting_with_dash_stays_last() {
    let command = ClaudeCommand::new("--help");
    assert_eq!(command.build_args().last().unwrap(), "--help");
    assert_eq!(command.message(), "--help");
}

#[test]
fn command_is_clone() {
    let command = ClaudeCommand::new("task").session_id("s");
    let cloned = command.clone();

    assert_eq!(command.build_args(), cloned.build_args());
}

#[tokio::test]
async fn spawn_missing_binary_fails() {
    let result =
        ClaudeProcess::spawn_with_binary("claude-relay-missing-binary", &ClaudeCommand::new("x"));

    assert!(matches!(result, Err(SpawnError::NotFound { .. })));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_echo_and_wait() {
    let command = ClaudeCommand::new("ignored");
    // Use echo as a test binary - it will just output and exit
    let mut process = ClaudeProcess::spawn_with_binary("echo", &command).unwrap();

    assert!(process.id().is_some());

    let status = process.wait().await.unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn take_stdout_once() {
    let mut process =
        ClaudeProcess::spawn_with_binary("echo", &ClaudeCommand::new("hello")).unwrap();

    assert!(process.take_stdout().is_some());
    assert!(process.take_stdout().is_none());

    process.wait().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn take_stderr_once() {
    let mut process =
        ClaudeProcess::spawn_with_binary("echo", &ClaudeCommand::new("test")).unwrap();

    assert!(process.take_stderr().is_some());
    assert!(process.take_stderr().is_none());

    process.wait().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_exit_is_reported() {
    let mut process =
        ClaudeProcess::spawn_with_binary("false", &ClaudeCommand::new("x")).unwrap();

    let status = process.wait().await.unwrap();
    assert!(!status.success());
    assert!(matches!(status, ProcessExit::Code(code) if code != 0));
}

#[cfg(unix)]
#[tokio::test]
async fn start_kill_reports_signal() {
    let slow = crate::common::scripts().path("slow");
    let mut process =
        ClaudeProcess::spawn_with_binary(&slow.to_string_lossy(), &ClaudeCommand::new("x"))
            .unwrap();

    process.start_kill().unwrap();
    assert_eq!(process.wait().await.unwrap(), ProcessExit::Signaled(Some(9)));
}

#[cfg(unix)]
#[tokio::test]
async fn sigterm_ends_cooperative_child_within_grace() {
    let slow = crate::common::scripts().path("slow");
    let mut process =
        ClaudeProcess::spawn_with_binary(&slow.to_string_lossy(), &ClaudeCommand::new("x"))
            .unwrap();

    process.signal_terminate().unwrap();
    let status = ChildProcess::wait_or_kill(&mut process, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(status, ProcessExit::Signaled(Some(15)));
}

#[cfg(unix)]
#[tokio::test]
async fn wait_or_kill_escalates_when_sigterm_ignored() {
    let stubborn = crate::common::scripts().path("ignores_sigterm");
    let mut process =
        ClaudeProcess::spawn_with_binary(&stubborn.to_string_lossy(), &ClaudeCommand::new("x"))
            .unwrap();

    // The trap is installed once the script reports ready
    let stdout = process.take_stdout().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ready"));

    process.signal_terminate().unwrap();
    let status = ChildProcess::wait_or_kill(&mut process, Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(status, ProcessExit::Signaled(Some(9)));
}
