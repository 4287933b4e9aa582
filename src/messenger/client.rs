//! The process messenger: one CLI invocation per request.
//!
//! Each call owns its child, two stream accumulators, a deadline timer and a
//! write-once [`OutcomeSlot`]. Three triggers race to fill the slot:
//!
//! 1. the exit watcher, once the child exits and both streams reach EOF;
//! 2. the watchdog, when the deadline elapses;
//! 3. the watchdog, when the messenger is shut down.
//!
//! Whoever resolves the slot first decides the call. A watchdog win cancels
//! the call's kill token, which makes the exit watcher signal the child and
//! drop everything the child produces afterwards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cli::{ProcessExit, DEFAULT_BINARY};

use super::{
    Accumulator, CallRegistry, ChildOutput, ChildProcess, ClaudeResponse, MalformedReason,
    MessageRequest, MessengerError, OutcomeSlot, ProcessSpawner, SendOptions, Spawner,
    DEFAULT_TIMEOUT,
};

/// Default time a child gets to exit after SIGTERM before it is killed.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Default cap on the bytes kept from each output stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

type CallResult = Result<ClaudeResponse, MessengerError>;

/// Settings for a [`Messenger`].
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Executable to launch.
    pub binary: String,
    /// Deadline used when a request does not carry one.
    pub default_timeout: Duration,
    /// Time between SIGTERM and SIGKILL for aborted calls.
    pub terminate_grace: Duration,
    /// Bytes kept from each of stdout and stderr. Larger stdout is rejected.
    pub max_output_bytes: usize,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Sends messages to the Claude CLI, one child process per call.
///
/// Cloning is cheap; clones share the spawner and the in-flight registry.
#[derive(Clone)]
pub struct Messenger {
    spawner: Arc<dyn Spawner>,
    default_timeout: Duration,
    terminate_grace: Duration,
    max_output_bytes: usize,
    registry: Arc<CallRegistry>,
}

impl Messenger {
    /// Create a messenger that launches `config.binary`.
    #[must_use]
    pub fn new(config: &MessengerConfig) -> Self {
        Self::with_spawner(config, Arc::new(ProcessSpawner::new(config.binary.as_str())))
    }

    /// Create a messenger with a custom spawner.
    #[must_use]
    pub fn with_spawner(config: &MessengerConfig, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            spawner,
            default_timeout: config.default_timeout,
            terminate_grace: config.terminate_grace,
            max_output_bytes: config.max_output_bytes,
            registry: Arc::new(CallRegistry::new()),
        }
    }

    /// Deadline applied to requests without one.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of calls currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Abort every in-flight call with [`MessengerError::Cancelled`] and
    /// terminate its child. Returns how many calls were aborted.
    ///
    /// Later calls fail with `Cancelled` without spawning anything.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.registry.close();
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelling in-flight Claude CLI calls");
        }
        cancelled
    }

    /// Validate `message` and `options`, then send.
    ///
    /// # Errors
    ///
    /// See [`Messenger::send_message`].
    pub async fn send(&self, message: impl Into<String>, options: SendOptions) -> CallResult {
        let request = MessageRequest::with_options(message, options)?;
        self.send_message(&request).await
    }

    /// Validate loosely typed input, then send.
    ///
    /// # Errors
    ///
    /// See [`Messenger::send_message`].
    pub async fn send_json(&self, message: Option<&Value>, options: Option<&Value>) -> CallResult {
        let request = MessageRequest::from_json(message, options)?;
        self.send_message(&request).await
    }

    /// Run one CLI call for `request`.
    ///
    /// # Errors
    ///
    /// Returns `Spawn` if the process cannot be launched, `Timeout` if the
    /// deadline elapses first, `ProcessFailure`/`ProcessIo` on a non-zero exit
    /// or I/O failure, `MalformedResponse` if stdout is not a valid reply and
    /// `Cancelled` if the messenger is shut down meanwhile.
    pub async fn send_message(&self, request: &MessageRequest) -> CallResult {
        let timeout = request.timeout_or(self.default_timeout);
        let started = Instant::now();

        if self.registry.is_closed() {
            tracing::debug!("Messenger is shut down, refusing Claude CLI call");
            return Err(MessengerError::Cancelled);
        }

        let mut child = self.spawner.spawn(&request.command()).map_err(|err| {
            tracing::warn!(error = %err, "Failed to spawn Claude CLI");
            MessengerError::from(err)
        })?;

        let registration = self.registry.register();
        let pid = child.id();
        tracing::debug!(
            call = %registration.id(),
            pid,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            session = request.session_id(),
            "Claude CLI call started"
        );

        let (slot, outcome) = OutcomeSlot::new();
        let slot = Arc::new(slot);
        let kill = CancellationToken::new();
        let (signaled_tx, signaled_rx) = oneshot::channel();

        let streams = Streams {
            stdout: spawn_drain(child.take_stdout(), self.max_output_bytes),
            stderr: spawn_drain(child.take_stderr(), self.max_output_bytes),
        };

        tokio::spawn(watch_exit(
            child,
            streams,
            ExitWatch {
                slot: Arc::clone(&slot),
                kill: kill.clone(),
                signaled: signaled_tx,
                grace: self.terminate_grace,
            },
        ));
        let _deadline = TaskGuard(tokio::spawn(watchdog(
            Arc::clone(&slot),
            kill.clone(),
            timeout,
            registration.token(),
        )));

        // Terminates the child if the caller stops polling before resolution
        let abandoned = kill.clone().drop_guard();
        let result = outcome.await.unwrap_or_else(|_| {
            Err(MessengerError::ProcessIo(std::io::Error::other(
                "call ended without an outcome",
            )))
        });
        abandoned.disarm();

        if matches!(
            result,
            Err(MessengerError::Timeout(_) | MessengerError::Cancelled)
        ) {
            // Sender is dropped without a value when the child had already exited
            let _ = signaled_rx.await;
        }

        match &result {
            Ok(_) => tracing::debug!(
                call = %registration.id(),
                pid,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Claude CLI call completed"
            ),
            Err(err) => tracing::warn!(
                call = %registration.id(),
                pid,
                kind = %err.kind(),
                error = %err,
                "Claude CLI call failed"
            ),
        }

        result
    }
}

/// Aborts the wrapped task when dropped.
struct TaskGuard<T>(JoinHandle<T>);

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Reader tasks for the two output streams.
struct Streams {
    stdout: JoinHandle<std::io::Result<Accumulator>>,
    stderr: JoinHandle<std::io::Result<Accumulator>>,
}

impl Streams {
    /// Wait for both streams to reach EOF.
    async fn flush(&mut self) -> std::io::Result<(Accumulator, Accumulator)> {
        let (stdout, stderr) = tokio::join!(&mut self.stdout, &mut self.stderr);
        let stdout = stdout.map_err(std::io::Error::other)??;
        let stderr = stderr.map_err(std::io::Error::other)??;
        Ok((stdout, stderr))
    }
}

impl Drop for Streams {
    fn drop(&mut self) {
        self.stdout.abort();
        self.stderr.abort();
    }
}

fn spawn_drain(
    output: Option<ChildOutput>,
    limit: usize,
) -> JoinHandle<std::io::Result<Accumulator>> {
    tokio::spawn(async move {
        let acc = Accumulator::with_limit(limit);
        match output {
            Some(reader) => acc.drain(reader).await,
            None => Ok(acc),
        }
    })
}

struct ExitWatch {
    slot: Arc<OutcomeSlot<CallResult>>,
    kill: CancellationToken,
    signaled: oneshot::Sender<()>,
    grace: Duration,
}

enum Trigger {
    Exited(std::io::Result<ProcessExit>),
    Kill,
}

async fn watch_exit(mut child: Box<dyn ChildProcess>, mut streams: Streams, watch: ExitWatch) {
    let pid = child.id();

    let trigger = tokio::select! {
        exit = child.wait() => Trigger::Exited(exit),
        () = watch.kill.cancelled() => Trigger::Kill,
    };

    let exit = match trigger {
        Trigger::Kill => {
            terminate(child.as_mut(), watch.grace, watch.signaled).await;
            return;
        }
        Trigger::Exited(exit) => exit,
    };

    if watch.slot.is_resolved() {
        tracing::debug!(pid, ?exit, "Ignoring Claude CLI exit, call already resolved");
        return;
    }

    let outcome = match exit {
        Err(err) => Err(MessengerError::ProcessIo(err)),
        Ok(exit) => {
            let flushed = tokio::select! {
                flushed = streams.flush() => flushed,
                () = watch.kill.cancelled() => return,
            };
            match flushed {
                Ok((stdout, stderr)) => settle(exit, stdout, stderr),
                Err(err) => Err(MessengerError::ProcessIo(err)),
            }
        }
    };

    if !watch.slot.resolve(outcome) {
        tracing::debug!(pid, "Claude CLI exit lost the race, outcome discarded");
    }
}

fn settle(exit: ProcessExit, stdout: Accumulator, stderr: Accumulator) -> CallResult {
    let stderr = stderr.into_string();
    if !exit.success() {
        return Err(MessengerError::ProcessFailure { exit, stderr });
    }

    if !stderr.is_empty() {
        tracing::debug!(stderr = %stderr, "Claude CLI wrote to stderr");
    }

    if stdout.overflowed() {
        let limit = stdout.limit().unwrap_or_default();
        return Err(MalformedReason::OutputTooLarge { limit }.into());
    }

    ClaudeResponse::parse(&stdout.into_string()).map_err(MessengerError::from)
}

async fn terminate(child: &mut dyn ChildProcess, grace: Duration, signaled: oneshot::Sender<()>) {
    let pid = child.id();

    match child.signal_terminate() {
        Ok(()) => tracing::debug!(pid, "Sent termination signal to Claude CLI"),
        Err(err) => tracing::warn!(pid, error = %err, "Failed to signal Claude CLI"),
    }
    let _ = signaled.send(());

    match child.wait_or_kill(grace).await {
        Ok(exit) => tracing::debug!(pid, ?exit, "Claude CLI terminated"),
        Err(err) => tracing::warn!(pid, error = %err, "Failed to reap Claude CLI"),
    }
}

async fn watchdog(
    slot: Arc<OutcomeSlot<CallResult>>,
    kill: CancellationToken,
    timeout: Duration,
    shutdown: CancellationToken,
) {
    let error = tokio::select! {
        () = tokio::time::sleep(timeout) => MessengerError::Timeout(timeout),
        () = shutdown.cancelled() => MessengerError::Cancelled,
    };

    let kind = error.kind();
    if slot.resolve(Err(error)) {
        tracing::debug!(kind = %kind, "Aborting Claude CLI call");
        kill.cancel();
    }
}
