//! MCP Common - Shared utilities for MCP protocol peers
//!
//! This crate provides the pieces every component that speaks the MCP
//! JSON-RPC protocol needs:
//!
//! - **Messages**: [`Message`], the JSON-RPC envelope with opaque payloads
//! - **Errors**: [`RpcError`], standard error codes, and conversion traits
//! - **Initialization**: [`init_tracing`] for stderr logging (stdout carries frames)
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_common::{Message, RpcError};
//!
//! let ping = Message::request(1.into(), "ping", None);
//! let frame = ping.to_frame()?;
//! assert_eq!(frame.last(), Some(&b'\n'));
//! ```

pub mod error;
pub mod init;
pub mod message;

// Re-export commonly used items at crate root
pub use error::{
    internal_error, invalid_params, IntoRpcError, ResultExt, RpcError, RpcResult,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
pub use init::{init_tracing, LogFormat};
pub use message::{Message, JSONRPC_VERSION};

// Re-export the raw JSON type used for opaque payloads
pub use serde_json::value::RawValue;
