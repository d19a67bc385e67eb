//! Managed server processes
//!
//! Each [`ManagedProcess`] has exactly one watcher task. The watcher owns the
//! OS child handle and is the only code that waits on it, so the process is
//! reaped once. Everyone else talks to the child through a control channel
//! (terminate / kill) and learns about the exit through a `watch` channel.

use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};

use super::error::{LaunchError, LaunchResult};

/// Lifecycle state of a managed process
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Unknown,
    /// Handle created, OS start not yet confirmed
    Starting,
    Running,
    /// Stop requested, waiting for exit
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Unknown => write!(f, "unknown"),
            State::Starting => write!(f, "starting"),
            State::Running => write!(f, "running"),
            State::Stopping => write!(f, "stopping"),
            State::Stopped => write!(f, "stopped"),
            State::Failed => write!(f, "failed"),
        }
    }
}

/// Request delivered to the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// Graceful termination (SIGTERM on Unix)
    Terminate,
    Kill,
}

/// Mutable part of a managed process, guarded by the per-entry lock
#[derive(Debug, Default)]
struct Lifecycle {
    state: State,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
    error: Option<String>,
}

/// Point-in-time view of a managed process, for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub server: String,
    pub pid: Option<u32>,
    pub state: State,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub uptime_secs: Option<i64>,
}

/// A launched server process
pub struct ManagedProcess {
    server: String,
    pid: Option<u32>,
    lifecycle: Mutex<Lifecycle>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<ChildStdout>>,
    stderr: Mutex<Option<ChildStderr>>,
    control: mpsc::UnboundedSender<Signal>,
    exited: watch::Receiver<bool>,
    cancel: watch::Sender<bool>,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("server", &self.server)
            .field("pid", &self.pid)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManagedProcess {
    /// Spawn `command` and start its watcher.
    ///
    /// `shutdown` is the caller's context: once it reads `true` the process
    /// receives the graceful termination signal.
    pub(crate) fn spawn(
        server: &str,
        mut command: Command,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> LaunchResult<Arc<Self>> {
        let mut lifecycle = Lifecycle {
            state: State::Starting,
            ..Default::default()
        };

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                lifecycle.state = State::Failed;
                lifecycle.error = Some(source.to_string());
                tracing::error!(
                    server,
                    error = %source,
                    state = %lifecycle.state,
                    "failed to start server"
                );
                return Err(LaunchError::Spawn {
                    server: server.to_string(),
                    source,
                });
            }
        };

        lifecycle.state = State::Running;
        lifecycle.started_at = Some(Utc::now());

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let process = Arc::new(Self {
            server: server.to_string(),
            pid: child.id(),
            stdin: Mutex::new(child.stdin.take()),
            stdout: Mutex::new(child.stdout.take()),
            stderr: Mutex::new(child.stderr.take()),
            lifecycle: Mutex::new(lifecycle),
            control: control_tx,
            exited: exited_rx,
            cancel: cancel_tx,
        });

        tokio::spawn(watch_process(
            Arc::clone(&process),
            child,
            control_rx,
            exited_tx,
            cancel_rx,
            shutdown,
        ));

        Ok(process)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> State {
        lock(&self.lifecycle).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    pub fn exit_code(&self) -> Option<i32> {
        lock(&self.lifecycle).exit_code
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.lifecycle).started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.lifecycle).stopped_at
    }

    /// Terminal error, if the process failed
    pub fn error(&self) -> Option<String> {
        lock(&self.lifecycle).error.clone()
    }

    pub fn status(&self) -> ProcessStatus {
        let lifecycle = lock(&self.lifecycle);
        let uptime_secs = lifecycle.started_at.map(|start| {
            let end = lifecycle.stopped_at.unwrap_or_else(Utc::now);
            (end - start).num_seconds()
        });
        ProcessStatus {
            server: self.server.clone(),
            pid: self.pid,
            state: lifecycle.state,
            started_at: lifecycle.started_at,
            stopped_at: lifecycle.stopped_at,
            exit_code: lifecycle.exit_code,
            error: lifecycle.error.clone(),
            uptime_secs,
        }
    }

    /// Take the write end of the child's stdin pipe
    pub fn take_stdin(&self) -> Option<ChildStdin> {
        lock(&self.stdin).take()
    }

    /// Take the read end of the child's stdout pipe
    pub fn take_stdout(&self) -> Option<ChildStdout> {
        lock(&self.stdout).take()
    }

    /// Take the read end of the child's stderr pipe
    pub fn take_stderr(&self) -> Option<ChildStderr> {
        lock(&self.stderr).take()
    }

    /// Cancel the process's execution context: sends the graceful
    /// termination signal, never a kill.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait until the watcher has recorded the exit
    pub async fn wait(&self) {
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }

    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// `Err(ProcessExit)` if the process died unexpectedly
    pub fn exit_result(&self) -> LaunchResult<()> {
        let lifecycle = lock(&self.lifecycle);
        if lifecycle.state == State::Failed {
            return Err(LaunchError::ProcessExit {
                server: self.server.clone(),
                code: lifecycle.exit_code.unwrap_or(-1),
            });
        }
        Ok(())
    }

    /// Graceful stop with a hard deadline.
    ///
    /// Sends the termination signal, then waits up to `timeout` for the
    /// exit before escalating to a kill. Stopping an entry that is already
    /// stopping is a no-op.
    pub async fn stop(&self, timeout: Duration) -> LaunchResult<()> {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.state {
                State::Running => lifecycle.state = State::Stopping,
                State::Stopping => return Ok(()),
                state => {
                    return Err(LaunchError::NotRunning {
                        server: self.server.clone(),
                        state: state.to_string(),
                    })
                }
            }
        }

        tracing::debug!(server = %self.server, ?timeout, "stopping server");
        self.send(Signal::Terminate);

        if tokio::time::timeout(timeout, self.wait()).await.is_err() {
            tracing::warn!(
                server = %self.server,
                ?timeout,
                "server did not exit after termination signal, killing"
            );
            self.send(Signal::Kill);
            self.wait().await;
        }

        Ok(())
    }

    fn send(&self, signal: Signal) {
        // The watcher is gone only once the exit is recorded
        let _ = self.control.send(signal);
    }

    /// Exit bookkeeping, performed once by the watcher
    fn record_exit(&self, status: io::Result<ExitStatus>) {
        let mut lifecycle = lock(&self.lifecycle);
        lifecycle.stopped_at = Some(Utc::now());

        let requested = matches!(lifecycle.state, State::Stopping | State::Stopped);
        let unexpected = if requested { State::Stopped } else { State::Failed };

        match status {
            Ok(status) if status.success() => {
                lifecycle.exit_code = Some(0);
                lifecycle.state = State::Stopped;
            }
            Ok(status) => {
                lifecycle.exit_code = Some(exit_code_of(status));
                lifecycle.error = Some(format!("process exited with {}", status));
                lifecycle.state = unexpected;
            }
            Err(e) => {
                lifecycle.error = Some(format!("failed to wait for process: {}", e));
                lifecycle.state = unexpected;
            }
        }

        let runtime = match (lifecycle.started_at, lifecycle.stopped_at) {
            (Some(start), Some(stop)) => (stop - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        };
        tracing::info!(
            server = %self.server,
            exit_code = ?lifecycle.exit_code,
            state = %lifecycle.state,
            ?runtime,
            "server stopped"
        );
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

enum WatchEvent {
    Exited(io::Result<ExitStatus>),
    Signal(Signal),
}

/// Resolves once `rx` reads `true`; never resolves if the sender is gone
async fn requested(rx: Option<&mut watch::Receiver<bool>>) {
    match rx {
        Some(rx) => {
            if rx.wait_for(|flag| *flag).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

async fn watch_process(
    process: Arc<ManagedProcess>,
    mut child: Child,
    mut control: mpsc::UnboundedReceiver<Signal>,
    exited: watch::Sender<bool>,
    mut cancel: watch::Receiver<bool>,
    mut shutdown: Option<watch::Receiver<bool>>,
) {
    let mut terminating = false;

    let status = loop {
        let event = tokio::select! {
            status = child.wait() => WatchEvent::Exited(status),
            Some(signal) = control.recv() => WatchEvent::Signal(signal),
            _ = requested(Some(&mut cancel)), if !terminating => {
                WatchEvent::Signal(Signal::Terminate)
            }
            _ = requested(shutdown.as_mut()), if !terminating => {
                WatchEvent::Signal(Signal::Terminate)
            }
        };

        match event {
            WatchEvent::Exited(status) => break status,
            WatchEvent::Signal(signal) => {
                terminating |= signal == Signal::Terminate;
                deliver(&mut child, signal, &process.server);
            }
        }
    };

    process.record_exit(status);
    exited.send_replace(true);
}

fn deliver(child: &mut Child, signal: Signal, server: &str) {
    match signal {
        Signal::Terminate => terminate(child, server),
        Signal::Kill => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(server, error = %e, "failed to kill server");
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child, server: &str) {
    let Some(pid) = child.id() else {
        return;
    };
    tracing::debug!(server, pid, "sending SIGTERM");
    // SAFETY: plain syscall; the child has not been reaped, so `pid` is still ours
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        tracing::warn!(server, pid, error = %io::Error::last_os_error(), "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, server: &str) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(server, error = %e, "failed to terminate server");
    }
}
