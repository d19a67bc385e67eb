//! JSON-RPC error object and conversion helpers
//!
//! Provides the structured `error` member of a JSON-RPC response, the
//! standard error codes, and traits for turning local errors into one.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Invalid JSON was received
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist or is not available
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i64 = -32603;

/// Structured JSON-RPC error: `{code, message, data?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    /// Opaque; an explicit `null` survives a round trip
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub data: Option<Value>,
}

/// Deserialize a field that is present in the input, keeping `null` as `Some`.
///
/// Combined with `#[serde(default)]` this distinguishes "absent" from "null".
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {}", method))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// Type alias for results that fail with a JSON-RPC error
pub type RpcResult<T> = Result<T, RpcError>;

/// Trait for converting errors into JSON-RPC errors
///
/// Implement this trait for local error types so they can be reported
/// back to a peer as the `error` member of a response.
///
/// # Example
///
/// ```rust,ignore
/// use mcp_common::{IntoRpcError, RpcError};
///
/// impl IntoRpcError for MyError {
///     fn into_rpc_error(self) -> RpcError {
///         RpcError::internal_error(self.to_string())
///     }
/// }
/// ```
pub trait IntoRpcError {
    /// Convert this error into a JSON-RPC error
    fn into_rpc_error(self) -> RpcError;
}

impl IntoRpcError for std::io::Error {
    fn into_rpc_error(self) -> RpcError {
        RpcError::internal_error(format!("IO error: {}", self))
    }
}

impl IntoRpcError for serde_json::Error {
    fn into_rpc_error(self) -> RpcError {
        if self.is_syntax() || self.is_eof() {
            RpcError::parse_error(format!("JSON error: {}", self))
        } else {
            RpcError::invalid_request(format!("JSON error: {}", self))
        }
    }
}

impl IntoRpcError for anyhow::Error {
    fn into_rpc_error(self) -> RpcError {
        RpcError::internal_error(self.to_string())
    }
}

impl IntoRpcError for String {
    fn into_rpc_error(self) -> RpcError {
        RpcError::internal_error(self)
    }
}

impl IntoRpcError for &str {
    fn into_rpc_error(self) -> RpcError {
        RpcError::internal_error(self.to_string())
    }
}

/// Extension trait for Result types to convert to JSON-RPC errors
pub trait ResultExt<T> {
    /// Convert the error to a JSON-RPC error
    fn to_rpc_err(self) -> Result<T, RpcError>;
}

impl<T, E: IntoRpcError> ResultExt<T> for Result<T, E> {
    fn to_rpc_err(self) -> Result<T, RpcError> {
        self.map_err(|e| e.into_rpc_error())
    }
}

/// Create an internal error with a message
pub fn internal_error(message: impl Into<String>) -> RpcError {
    RpcError::internal_error(message)
}

/// Create an invalid params error with a message
pub fn invalid_params(message: impl Into<String>) -> RpcError {
    RpcError::invalid_params(message)
}
