//! Claude CLI process spawning and control.
//!
//! This module provides a builder for the one-shot `claude` invocation used by
//! the relay, along with control methods for the running process. Arguments
//! are always handed to the OS as a vector; nothing is ever passed through a
//! shell.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Default executable name, resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "claude";

/// Output format requested from the CLI.
pub const OUTPUT_FORMAT: &str = "json";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("`{binary}` not found: {source}")]
    NotFound {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    /// Permission denied when spawning.
    #[error("permission denied launching `{binary}`: {source}")]
    PermissionDenied {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    #[must_use]
    pub fn from_io(binary: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                binary: binary.to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                binary: binary.to_string(),
                source: err,
            },
            _ => Self::Io(err),
        }
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited normally with a status code.
    Code(i32),
    /// The process was terminated by a signal.
    Signaled(Option<i32>),
}

impl ProcessExit {
    /// Whether the process exited with status zero.
    #[must_use]
    pub fn success(self) -> bool {
        self == Self::Code(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self::Signaled(status.signal())
        }

        #[cfg(not(unix))]
        {
            Self::Signaled(None)
        }
    }
}

/// Builder for the arguments of a single Claude CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaudeCommand {
    message: String,
    session_id: Option<String>,
}

impl ClaudeCommand {
    /// Create a new command carrying the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Continue an existing session.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the session id, if set.
    #[must_use]
    pub fn get_session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Build the command-line arguments.
    ///
    /// The message is always the last element, passed as a single argument.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["--output-format".to_string(), OUTPUT_FORMAT.to_string()];

        if let Some(session_id) = &self.session_id {
            args.push("--session-id".to_string());
            args.push(session_id.clone());
        }

        args.push(self.message.clone());
        args
    }

    /// Render the invocation as a copy-pasteable shell line, for logs only.
    #[must_use]
    pub fn display(&self, binary: &str) -> String {
        std::iter::once(binary.to_string())
            .chain(self.build_args())
            .map(|arg| shell_escape::escape(arg.into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A running Claude CLI process.
#[derive(Debug)]
pub struct ClaudeProcess {
    child: Child,
}

impl ClaudeProcess {
    /// Spawn a process using a custom binary.
    ///
    /// The child is killed if this handle is dropped before it exits.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn_with_binary(binary: &str, command: &ClaudeCommand) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(binary);
        cmd.args(command.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|err| SpawnError::from_io(binary, err))?;

        tracing::debug!(
            pid = child.id(),
            command = %command.display(binary),
            "Spawned Claude CLI"
        );

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ProcessExit> {
        self.child.wait().await.map(ProcessExit::from)
    }

    /// Send SIGKILL without waiting for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Ask the process to terminate without waiting for it.
    ///
    /// On Unix this sends SIGTERM. On other platforms it falls back to an
    /// immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn signal_terminate(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(pid) = self.id() else {
                // Process already reaped
                return Ok(());
            };
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            kill(nix_pid, Signal::SIGTERM).map_err(std::io::Error::from)
        }

        #[cfg(not(unix))]
        {
            self.start_kill()
        }
    }
}
