//! Supervisor lifecycle through the public API

use std::time::{Duration, Instant};

use chrono::Utc;
use mcp_adapter::launcher::{LaunchError, LaunchOptions, State};

use super::fixtures::{graceful_script, Sandbox, STUBBORN_SCRIPT};

#[tokio::test]
async fn test_immediate_exit_is_stopped() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("quick", "exit 0");
    let launcher = sandbox.launcher();

    let process = launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    process.wait().await;

    let process = launcher.get("quick").unwrap();
    assert_eq!(process.state(), State::Stopped);
    assert_eq!(process.exit_code(), Some(0));
    assert!(process.stopped_at().unwrap() >= process.started_at().unwrap());

    let status = process.status();
    assert_eq!(status.server, "quick");
    assert_eq!(status.exit_code, Some(0));
    assert!(status.uptime_secs.is_some());
}

#[tokio::test]
async fn test_unexpected_exit_is_failed_and_relaunchable() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("crashy", "exit 4");
    let launcher = sandbox.launcher();

    let process = launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    process.wait().await;
    assert_eq!(process.state(), State::Failed);
    assert_eq!(process.exit_code(), Some(4));
    assert!(matches!(
        process.exit_result(),
        Err(LaunchError::ProcessExit { code: 4, .. })
    ));
    assert!(launcher.list_running().is_empty());

    // A failed entry does not block a new launch
    let again = launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    again.wait().await;
}

#[tokio::test]
async fn test_graceful_stop_keeps_real_exit_code() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("polite", &graceful_script(5));
    let launcher = sandbox.launcher();

    launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let clock = Instant::now();
    launcher.stop("polite", Duration::from_secs(5)).await.unwrap();
    assert!(clock.elapsed() < Duration::from_secs(5));

    let process = launcher.get("polite").unwrap();
    assert_eq!(process.state(), State::Stopped);
    assert_eq!(process.exit_code(), Some(5));
}

#[tokio::test]
async fn test_forced_kill_after_timeout() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("stubborn", STUBBORN_SCRIPT);
    let launcher = sandbox.launcher();

    launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let timeout = Duration::from_millis(200);
    let stop_started = Utc::now();
    let clock = Instant::now();
    launcher.stop("stubborn", timeout).await.unwrap();
    let elapsed = clock.elapsed();

    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_millis(500));

    let process = launcher.get("stubborn").unwrap();
    assert_eq!(process.state(), State::Stopped);
    assert!(process.stopped_at().unwrap() >= stop_started + chrono::Duration::milliseconds(200));
}

#[tokio::test]
async fn test_second_stop_while_stopping_is_noop() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("twice", STUBBORN_SCRIPT);
    let launcher = sandbox.launcher();

    launcher.launch(&server, LaunchOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (first, second) = tokio::join!(
        launcher.stop("twice", Duration::from_millis(300)),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            launcher.stop("twice", Duration::from_millis(300)).await
        }
    );
    first.unwrap();
    second.unwrap();
    assert_eq!(launcher.get("twice").unwrap().state(), State::Stopped);

    // Once stopped, another stop is an error
    let err = launcher
        .stop("twice", Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::NotRunning { .. }));
}

#[tokio::test]
async fn test_stop_all_is_best_effort() {
    let sandbox = Sandbox::new();
    let launcher = sandbox.launcher();
    let done = sandbox.install("done", "exit 0");
    let a = sandbox.install("a", &graceful_script(0));
    let b = sandbox.install("b", STUBBORN_SCRIPT);

    let finished = launcher.launch(&done, LaunchOptions::default()).await.unwrap();
    finished.wait().await;
    launcher.launch(&a, LaunchOptions::default()).await.unwrap();
    launcher.launch(&b, LaunchOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(launcher.list_running().len(), 2);

    launcher.stop_all(Duration::from_millis(200)).await;

    assert!(launcher.list_running().is_empty());
    assert_eq!(launcher.get("a").unwrap().state(), State::Stopped);
    assert_eq!(launcher.get("b").unwrap().state(), State::Stopped);
    assert_eq!(launcher.get("done").unwrap().state(), State::Stopped);
}
