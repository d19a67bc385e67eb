//! Process supervisor
//!
//! Tracks at most one live process per server name, launches servers after
//! checking their runtime, and stops them with a graceful-then-forced
//! sequence.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::{is_installed, AdapterConfig};
use crate::manifest::ServerDescriptor;
use crate::runtime::{satisfies, Runtime, RuntimeDetector};

use super::error::{LaunchError, LaunchResult};
use super::process::{ManagedProcess, State};
use super::resolver;

/// Per-launch options supplied by the caller
#[derive(Debug, Default)]
pub struct LaunchOptions {
    /// Appended after the descriptor's default arguments
    pub args: Vec<String>,
    /// Overrides on top of the ambient and descriptor environment
    pub env: HashMap<String, String>,
    /// Defaults to the server's install directory
    pub work_dir: Option<PathBuf>,
    /// Explicit redirections; `None` means a pipe handed back to the caller
    pub stdin: Option<Stdio>,
    pub stdout: Option<Stdio>,
    pub stderr: Option<Stdio>,
    /// Caller context; once it reads `true` the server is asked to terminate
    pub shutdown: Option<watch::Receiver<bool>>,
}

#[derive(Default)]
struct Table {
    processes: HashMap<String, Arc<ManagedProcess>>,
    /// Names with a launch in flight
    launching: HashSet<String>,
}

/// Releases a launch reservation when the launch finishes either way
struct Reservation<'a> {
    table: &'a Mutex<Table>,
    name: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        lock(self.table).launching.remove(&self.name);
    }
}

fn lock(table: &Mutex<Table>) -> MutexGuard<'_, Table> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Launches and supervises MCP server processes
pub struct Launcher {
    config: AdapterConfig,
    detector: Arc<dyn RuntimeDetector>,
    table: Mutex<Table>,
}

impl Launcher {
    pub fn new(config: AdapterConfig, detector: Arc<dyn RuntimeDetector>) -> Self {
        Self {
            config,
            detector,
            table: Mutex::new(Table::default()),
        }
    }

    /// Launch `server` and start watching it.
    ///
    /// Nothing is spawned if the server is already running, not installed,
    /// lacks its runtime, or has no resolvable entrypoint.
    pub async fn launch(
        &self,
        server: &ServerDescriptor,
        options: LaunchOptions,
    ) -> LaunchResult<Arc<ManagedProcess>> {
        server.validate()?;
        let _reservation = self.reserve(&server.name)?;

        let install_dir = self.config.server_install_path(&server.name);
        if !is_installed(&install_dir) {
            return Err(LaunchError::ServerNotInstalled {
                server: server.name.clone(),
                install_dir,
            });
        }

        let runtime = self.check_runtime(server).await?;
        let resolved = resolver::resolve(
            server,
            &install_dir,
            &runtime,
            &options.args,
            &options.env,
        )?;

        let mut command = Command::new(&resolved.program);
        command
            .args(&resolved.args)
            .env_clear()
            .envs(&resolved.env)
            .current_dir(options.work_dir.unwrap_or(resolved.working_dir))
            .stdin(options.stdin.unwrap_or_else(Stdio::piped))
            .stdout(options.stdout.unwrap_or_else(Stdio::piped))
            .stderr(options.stderr.unwrap_or_else(Stdio::piped))
            .kill_on_drop(true);

        tracing::info!(
            server = %server.name,
            path = %resolved.program.display(),
            args = ?resolved.args,
            "launching server"
        );

        let process = ManagedProcess::spawn(&server.name, command, options.shutdown)?;
        lock(&self.table)
            .processes
            .insert(server.name.clone(), Arc::clone(&process));

        Ok(process)
    }

    /// Claim `name` for a launch, failing if it is live or being launched
    fn reserve(&self, name: &str) -> LaunchResult<Reservation<'_>> {
        let mut table = lock(&self.table);
        let live = table.processes.get(name).is_some_and(|p| {
            matches!(p.state(), State::Starting | State::Running | State::Stopping)
        });
        if live || !table.launching.insert(name.to_string()) {
            return Err(LaunchError::AlreadyRunning(name.to_string()));
        }
        Ok(Reservation {
            table: &self.table,
            name: name.to_string(),
        })
    }

    async fn check_runtime(&self, server: &ServerDescriptor) -> LaunchResult<Runtime> {
        let runtime = self
            .detector
            .detect(server.server_type)
            .await
            .map_err(|e| LaunchError::RuntimeUnmet {
                server: server.name.clone(),
                reason: e.to_string(),
            })?;

        let constraint = server.runtime_constraint();
        if !satisfies(&runtime.version, constraint) {
            return Err(LaunchError::RuntimeUnmet {
                server: server.name.clone(),
                reason: format!(
                    "{} {} does not satisfy {}",
                    runtime.name, runtime.version, constraint
                ),
            });
        }

        tracing::debug!(
            server = %server.name,
            runtime = %runtime.name,
            version = %runtime.version,
            "runtime ok"
        );
        Ok(runtime)
    }

    /// Stop a running server, killing it if it outlives `timeout`
    pub async fn stop(&self, name: &str, timeout: Duration) -> LaunchResult<()> {
        let process = self.get(name).ok_or_else(|| LaunchError::NotRunning {
            server: name.to_string(),
            state: State::Unknown.to_string(),
        })?;
        process.stop(timeout).await
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManagedProcess>> {
        lock(&self.table).processes.get(name).cloned()
    }

    /// Every process currently running, in no particular order
    pub fn list_running(&self) -> Vec<Arc<ManagedProcess>> {
        lock(&self.table)
            .processes
            .values()
            .filter(|p| p.is_running())
            .cloned()
            .collect()
    }

    /// Best-effort stop of every tracked process, concurrently
    pub async fn stop_all(&self, timeout: Duration) {
        let processes: Vec<_> = lock(&self.table).processes.values().cloned().collect();

        let mut stops = JoinSet::new();
        for process in processes {
            stops.spawn(async move {
                let result = process.stop(timeout).await;
                (process, result)
            });
        }

        while let Some(joined) = stops.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((process, Err(LaunchError::NotRunning { .. }))) => {
                    tracing::debug!(server = %process.server(), "already stopped");
                }
                Ok((process, Err(e))) => {
                    tracing::warn!(server = %process.server(), error = %e, "failed to stop server");
                }
                Err(e) => tracing::warn!(error = %e, "stop task panicked"),
            }
        }
    }
}
