//! MCP adapter
//!
//! Supervises locally installed MCP server processes and relays
//! newline-delimited JSON-RPC between a client and a server's stdio.
//!
//! - [`launcher`]: command resolution, launching, stop with timeout
//! - [`runtime`]: runtime detection and version constraints
//! - [`transport`]: line-framed transports and the duplex relay
//! - [`config`] / [`manifest`]: configuration and server descriptors

pub mod cli;
pub mod config;
pub mod handlers;
pub mod launcher;
pub mod manifest;
pub mod runtime;
pub mod transport;
