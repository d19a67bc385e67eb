//! JSON-RPC relay through a launched server

use std::sync::Arc;
use std::time::Duration;

use mcp_adapter::launcher::{LaunchOptions, State};
use mcp_adapter::transport::{LineTransport, Proxy, Transport};
use mcp_common::{Message, RawValue};
use serde_json::json;
use tokio::io::{duplex, split};

use super::fixtures::Sandbox;

#[tokio::test]
async fn test_echo_server_round_trip() {
    let sandbox = Sandbox::new();
    // `cat` hands every frame straight back
    let server = sandbox.install("echo", "exec cat");
    let launcher = sandbox.launcher();
    let process = launcher.launch(&server, LaunchOptions::default()).await.unwrap();

    let child = Arc::new(LineTransport::for_child(
        process.take_stdout().unwrap(),
        process.take_stdin().unwrap(),
    ));
    let (near, far) = duplex(8192);
    let (near_r, near_w) = split(near);
    let (far_r, far_w) = split(far);
    let client = LineTransport::new(far_r, far_w);

    let proxy = Proxy::new(Arc::new(LineTransport::new(near_r, near_w)), child.clone());
    let mut relay = proxy.spawn();

    let sent: Vec<Message> = (0..25)
        .map(|i| {
            let body = format!("{{\"name\":\"tool-{i}\",\"arguments\":{{}}}}");
            let params = RawValue::from_string(body).unwrap();
            Message::request(json!(i), "tools/call", Some(params))
        })
        .collect();
    for message in &sent {
        client.send(message).await.unwrap();
    }
    for message in &sent {
        let echoed = tokio::time::timeout(Duration::from_secs(5), client.receive())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed.to_frame().unwrap(), message.to_frame().unwrap());
    }

    // Closing the server's stdin ends `cat`, which ends the relay
    child.close().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), relay.first_error())
        .await
        .unwrap();
    assert!(err.is_closed());

    process.wait().await;
    assert_eq!(process.state(), State::Stopped);
    assert_eq!(process.exit_code(), Some(0));
}

#[tokio::test]
async fn test_server_death_ends_relay() {
    let sandbox = Sandbox::new();
    let server = sandbox.install("flaky", "read line; exit 2");
    let launcher = sandbox.launcher();
    let process = launcher.launch(&server, LaunchOptions::default()).await.unwrap();

    let child = Arc::new(LineTransport::for_child(
        process.take_stdout().unwrap(),
        process.take_stdin().unwrap(),
    ));
    let (near, far) = duplex(1024);
    let (near_r, near_w) = split(near);
    let (far_r, far_w) = split(far);
    let client = LineTransport::new(far_r, far_w);
    let proxy = Proxy::new(Arc::new(LineTransport::new(near_r, near_w)), child);

    let running = tokio::spawn(async move { proxy.run().await });
    client
        .send(&Message::notification("notifications/initialized", None))
        .await
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
    assert!(err.is_closed());

    process.wait().await;
    assert_eq!(process.state(), State::Failed);
    assert_eq!(process.exit_code(), Some(2));
}
