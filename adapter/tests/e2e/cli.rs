//! The `mcp-adapter` binary end to end

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use super::fixtures::Sandbox;

fn adapter() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mcp-adapter"));
    cmd.env_remove("MCP_ADAPTER_CONFIG")
        .env_remove("MCP_ADAPTER_HOME")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a config file declaring one shell-backed server
fn write_config(sandbox: &Sandbox, name: &str, script: &str) -> std::path::PathBuf {
    sandbox.install(name, script);
    let path = sandbox.path().join("adapter.toml");
    let config = format!(
        r#"
[adapter]
base_dir = "{base}"
stop_timeout_secs = 2

[servers.{name}]
type = "binary"
entrypoint = "server"
args = ["-c", "{script}"]
"#,
        base = sandbox.path().display(),
    );
    std::fs::write(&path, config).unwrap();
    path
}

fn wait_for_file(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> ExitStatus {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("adapter still running after {limit:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_run_relays_stdio() {
    let sandbox = Sandbox::new();
    let config = write_config(&sandbox, "echo", "exec cat");

    let mut child = adapter()
        .arg("--config")
        .arg(&config)
        .args(["run", "echo"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let frames = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\
                  {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
    child
        .stdin
        .take()
        .unwrap()
        .write_all(frames.as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8(output.stdout).unwrap(), frames);
}

#[test]
fn test_run_reports_server_failure() {
    let sandbox = Sandbox::new();
    let config = write_config(&sandbox, "broken", "exit 3");

    let output = adapter()
        .arg("--config")
        .arg(&config)
        .args(["run", "broken", "--no-stdio"])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exited with code 3"), "stderr: {stderr}");
}

#[test]
fn test_run_unknown_server() {
    let sandbox = Sandbox::new();
    let config = write_config(&sandbox, "echo", "exec cat");

    let output = adapter()
        .arg("--config")
        .arg(&config)
        .args(["run", "missing"])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not configured"));
}

#[test]
fn test_doctor_lists_servers() {
    let sandbox = Sandbox::new();
    let config = write_config(&sandbox, "echo", "exec cat");

    let output = adapter()
        .arg("--config")
        .arg(&config)
        .arg("doctor")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Runtimes ==="));
    assert!(stdout.contains("echo"));
    assert!(stdout.contains("installed"));
}

#[test]
fn test_run_stops_server_on_sigterm() {
    let sandbox = Sandbox::new();
    let script = "touch started; trap 'touch stopped; exit 0' TERM; while :; do sleep 0.05; done";
    let config = write_config(&sandbox, "term", script);
    let install = sandbox.path().join("servers").join("term");

    let mut child = adapter()
        .arg("--config")
        .arg(&config)
        .args(["run", "term", "--no-stdio"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_for_file(&install.join("started"));
    // SAFETY: plain kill(2) on a pid we spawned and have not reaped
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let status = wait_with_deadline(&mut child, Duration::from_secs(10));
    assert!(status.success(), "adapter exited with {status:?}");
    assert!(install.join("stopped").exists(), "server was not stopped gracefully");
}

#[test]
fn test_doctor_creates_missing_dirs() {
    let sandbox = Sandbox::new();
    let base = sandbox.path().join("fresh");
    let config = sandbox.path().join("adapter.toml");
    std::fs::write(
        &config,
        format!("[adapter]\nbase_dir = \"{}\"\n", base.display()),
    )
    .unwrap();

    let output = adapter()
        .arg("--config")
        .arg(&config)
        .arg("doctor")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(base.join("servers").is_dir());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No servers configured."));
}
