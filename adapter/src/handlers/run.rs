//! `run` command handler
//!
//! Launches one server under the supervisor and, for stdio servers, relays
//! our stdin/stdout to it until either side goes away.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::cli::RunArgs;
use crate::config::AdapterConfig;
use crate::launcher::{LaunchError, LaunchOptions, Launcher, ManagedProcess};
use crate::manifest::TransportKind;
use crate::runtime::SystemDetector;
use crate::transport::{LineTransport, Proxy, RelayHandle, Transport};

/// Parse repeated `KEY=VALUE` flags
pub fn parse_env(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("invalid environment override '{}', expected KEY=VALUE", pair),
        })
        .collect()
}

/// A running relay and the server-side transport it writes to
struct Relay {
    handle: RelayHandle,
    server: Arc<dyn Transport>,
}

/// SIGINT and SIGTERM listeners, installed before the server is launched
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("failed to listen for SIGINT")?,
            terminate: signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Resolves with the signal's name once one arrives
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            Some(()) = self.interrupt.recv() => "SIGINT",
            Some(()) = self.terminate.recv() => "SIGTERM",
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(_) => std::future::pending().await,
        }
    }
}

/// Handle the `run` command
pub async fn run_server(config: AdapterConfig, args: RunArgs) -> Result<()> {
    let server = config
        .server(&args.server)
        .cloned()
        .with_context(|| format!("server '{}' is not configured", args.server))?;
    let stop_timeout = config.stop_timeout;
    let relay_stdio = server.transport == TransportKind::Stdio && !args.no_stdio;

    let mut options = LaunchOptions {
        args: args.server_args(),
        env: parse_env(&args.env)?,
        ..Default::default()
    };
    if !relay_stdio {
        options.stdin = Some(Stdio::null());
        options.stdout = Some(Stdio::inherit());
        options.stderr = Some(Stdio::inherit());
    }

    let mut signals = ShutdownSignals::install()?;
    let launcher = Launcher::new(config, Arc::new(SystemDetector::new()));
    let process = launcher
        .launch(&server, options)
        .await
        .with_context(|| format!("failed to launch '{}'", server.name))?;

    let relay = if relay_stdio {
        Some(start_relay(&process)?)
    } else {
        None
    };

    supervise(&launcher, &process, relay, &mut signals, stop_timeout).await?;

    process.exit_result()?;
    Ok(())
}

fn start_relay(process: &ManagedProcess) -> Result<Relay> {
    let stdin = process.take_stdin().context("server stdin is not piped")?;
    let stdout = process.take_stdout().context("server stdout is not piped")?;

    // Server diagnostics go to our stderr untouched
    if let Some(mut stderr) = process.take_stderr() {
        tokio::spawn(async move {
            let _ = tokio::io::copy(&mut stderr, &mut tokio::io::stderr()).await;
        });
    }

    let server: Arc<dyn Transport> = Arc::new(LineTransport::for_child(stdout, stdin));
    let handle = Proxy::new(Arc::new(LineTransport::stdio()), Arc::clone(&server)).spawn();

    Ok(Relay { handle, server })
}

/// Wait for the server to exit, the relay to end, or SIGINT/SIGTERM, then
/// make sure the server is gone and its last output has been delivered.
async fn supervise(
    launcher: &Launcher,
    process: &ManagedProcess,
    mut relay: Option<Relay>,
    signals: &mut ShutdownSignals,
    stop_timeout: Duration,
) -> Result<()> {
    let relay_ended = async {
        match relay.as_mut() {
            Some(relay) => relay.handle.first_error().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = process.wait() => {}
        signal = signals.recv() => {
            tracing::info!(server = %process.server(), signal, "stopping server");
            stop(launcher, process, stop_timeout).await?;
        }
        err = relay_ended => {
            tracing::debug!(server = %process.server(), error = %err, "relay ended");
        }
    }

    if let Some(mut relay) = relay {
        // Closing the server's stdin is the polite way to ask it to leave
        if !close_within(relay.server.as_ref(), stop_timeout).await {
            tracing::warn!(server = %process.server(), "server stdin did not close in time");
        }
        if tokio::time::timeout(stop_timeout, process.wait()).await.is_err() {
            stop(launcher, process, stop_timeout).await?;
        }
        if tokio::time::timeout(stop_timeout, relay.handle.drain_to_client())
            .await
            .is_err()
        {
            tracing::warn!(server = %process.server(), "server output still open after exit");
        }
    }

    Ok(())
}

/// Close `transport`, giving up after `timeout`. Returns whether it closed.
async fn close_within(transport: &dyn Transport, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, transport.close()).await.is_ok()
}

async fn stop(launcher: &Launcher, process: &ManagedProcess, timeout: Duration) -> Result<()> {
    match launcher.stop(process.server(), timeout).await {
        // Exited on its own in the meantime
        Err(LaunchError::NotRunning { .. }) => Ok(()),
        result => result.with_context(|| format!("failed to stop '{}'", process.server())),
    }
}
