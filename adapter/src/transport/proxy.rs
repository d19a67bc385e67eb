//! Duplex relay between two transports

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{Transport, TransportError};

/// Forwards messages between a client-facing and a server-facing transport
pub struct Proxy {
    client: Arc<dyn Transport>,
    server: Arc<dyn Transport>,
}

impl Proxy {
    pub fn new(client: Arc<dyn Transport>, server: Arc<dyn Transport>) -> Self {
        Self { client, server }
    }

    /// Relay in both directions until one of them fails.
    ///
    /// Returns the first error (clean closure included). The other direction
    /// is left running so a frame it is writing is never cut in half; the
    /// caller closes both transports.
    pub async fn run(&self) -> TransportError {
        self.spawn().first_error().await
    }

    /// Start both direction loops and hand back their handles
    pub fn spawn(&self) -> RelayHandle {
        RelayHandle {
            to_server: Some(tokio::spawn(forward(
                "client->server",
                Arc::clone(&self.client),
                Arc::clone(&self.server),
            ))),
            to_client: Some(tokio::spawn(forward(
                "server->client",
                Arc::clone(&self.server),
                Arc::clone(&self.client),
            ))),
        }
    }
}

/// The two running directions of a relay.
///
/// Dropping the handle detaches whatever is still running.
pub struct RelayHandle {
    to_server: Option<JoinHandle<TransportError>>,
    to_client: Option<JoinHandle<TransportError>>,
}

fn joined(result: Result<TransportError, tokio::task::JoinError>) -> TransportError {
    result.unwrap_or_else(|e| TransportError::Io(std::io::Error::other(e)))
}

impl RelayHandle {
    /// Wait for the next direction to stop and return its error
    pub async fn first_error(&mut self) -> TransportError {
        let (result, to_server_done) = match (self.to_server.as_mut(), self.to_client.as_mut()) {
            (Some(to_server), Some(to_client)) => tokio::select! {
                result = to_server => (result, true),
                result = to_client => (result, false),
            },
            (Some(to_server), None) => (to_server.await, true),
            (None, Some(to_client)) => (to_client.await, false),
            (None, None) => return TransportError::Closed,
        };
        if to_server_done {
            self.to_server = None;
        } else {
            self.to_client = None;
        }
        joined(result)
    }

    /// Wait for the server->client direction to finish delivering.
    ///
    /// Returns `None` if it had already stopped.
    pub async fn drain_to_client(&mut self) -> Option<TransportError> {
        let result = self.to_client.as_mut()?.await;
        self.to_client = None;
        Some(joined(result))
    }
}

async fn forward(
    direction: &'static str,
    from: Arc<dyn Transport>,
    to: Arc<dyn Transport>,
) -> TransportError {
    loop {
        let result = match from.receive().await {
            Ok(message) => to.send(&message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::debug!(direction, error = %e, "relay stopped");
            return e;
        }
    }
}
