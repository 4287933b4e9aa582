//! Seam between the messenger and the operating system.
//!
//! [`Spawner`] launches a child for a [`ClaudeCommand`]; [`ChildProcess`] is
//! the small surface the messenger needs from it. [`ProcessSpawner`] is the
//! real implementation backed by [`ClaudeProcess`].

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::cli::{ClaudeCommand, ClaudeProcess, ProcessExit, SpawnError, DEFAULT_BINARY};

/// Boxed output stream of a child.
pub type ChildOutput = Box<dyn AsyncRead + Send + Unpin>;

/// A launched child process.
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if known.
    fn id(&self) -> Option<u32>;

    /// Take the standard output stream. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<ChildOutput>;

    /// Take the standard error stream. Returns `None` after the first call.
    fn take_stderr(&mut self) -> Option<ChildOutput>;

    /// Wait for the process to exit. Must be cancel safe.
    async fn wait(&mut self) -> std::io::Result<ProcessExit>;

    /// Ask the process to terminate (SIGTERM) without waiting.
    fn signal_terminate(&mut self) -> std::io::Result<()>;

    /// Kill the process (SIGKILL) without waiting.
    fn start_kill(&mut self) -> std::io::Result<()>;

    /// Wait up to `grace` for exit, then kill and reap.
    async fn wait_or_kill(&mut self, grace: Duration) -> std::io::Result<ProcessExit> {
        if let Ok(result) = tokio::time::timeout(grace, self.wait()).await {
            return result;
        }

        tracing::warn!(pid = self.id(), "Claude CLI ignored termination signal, killing");
        self.start_kill()?;
        self.wait().await
    }
}

/// Launches child processes.
pub trait Spawner: Send + Sync {
    /// Start a child for `command`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process cannot be launched.
    fn spawn(&self, command: &ClaudeCommand) -> Result<Box<dyn ChildProcess>, SpawnError>;
}

/// Spawns the real CLI binary.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    binary: String,
}

impl ProcessSpawner {
    /// Spawn `binary` (looked up on `PATH` unless it is a path).
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The configured executable.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for ProcessSpawner {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl Spawner for ProcessSpawner {
    fn spawn(&self, command: &ClaudeCommand) -> Result<Box<dyn ChildProcess>, SpawnError> {
        let process = ClaudeProcess::spawn_with_binary(&self.binary, command)?;
        Ok(Box::new(process))
    }
}

#[async_trait]
impl ChildProcess for ClaudeProcess {
    fn id(&self) -> Option<u32> {
        ClaudeProcess::id(self)
    }

    fn take_stdout(&mut self) -> Option<ChildOutput> {
        ClaudeProcess::take_stdout(self).map(|out| Box::new(out) as ChildOutput)
    }

    fn take_stderr(&mut self) -> Option<ChildOutput> {
        ClaudeProcess::take_stderr(self).map(|err| Box::new(err) as ChildOutput)
    }

    async fn wait(&mut self) -> std::io::Result<ProcessExit> {
        ClaudeProcess::wait(self).await
    }

    fn signal_terminate(&mut self) -> std::io::Result<()> {
        ClaudeProcess::signal_terminate(self)
    }

    fn start_kill(&mut self) -> std::io::Result<()> {
        ClaudeProcess::start_kill(self)
    }
}
