//! Message transports
//!
//! A [`Transport`] moves whole JSON-RPC [`Message`]s over a byte stream.
//! [`LineTransport`] frames them one per line; [`Proxy`] wires two
//! transports together.

pub mod proxy;
pub mod stdio;

use async_trait::async_trait;
use mcp_common::Message;
use thiserror::Error;

pub use proxy::{Proxy, RelayHandle};
pub use stdio::LineTransport;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer closed the stream, or the transport was closed locally
    #[error("transport closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TransportError {
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// Bidirectional message channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one message; concurrent senders never interleave frames
    async fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Block until the next full message arrives
    async fn receive(&self) -> Result<Message, TransportError>;

    /// Release the write side. Safe to call more than once.
    async fn close(&self) -> Result<(), TransportError>;
}
