//! JSON-RPC message envelope
//!
//! [`Message`] covers requests, notifications and responses in one shape.
//! `params` and `result` are kept as raw JSON text so a relay can pass them
//! through without ever building a value tree.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::error::{present, RpcError};

/// Protocol version tag carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// A single JSON-RPC message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,

    /// Request identifier; `Some(Value::Null)` is an explicit `"id": null`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub params: Option<Box<RawValue>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub result: Option<Box<RawValue>>,

    /// `Some(None)` is an explicit `"error": null`; see [`Message::rpc_error`]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub error: Option<Option<RpcError>>,
}

impl Message {
    fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }

    /// Create a request (has both `id` and `method`)
    pub fn request(id: Value, method: impl Into<String>, params: Option<Box<RawValue>>) -> Self {
        Self {
            id: Some(id),
            method: Some(method.into()),
            params,
            ..Self::empty()
        }
    }

    /// Create a notification (has `method`, no `id`)
    pub fn notification(method: impl Into<String>, params: Option<Box<RawValue>>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            ..Self::empty()
        }
    }

    /// Create a successful response
    pub fn response(id: Value, result: Box<RawValue>) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::empty()
        }
    }

    /// Create an error response
    pub fn error_response(id: Value, error: RpcError) -> Self {
        Self {
            id: Some(id),
            error: Some(Some(error)),
            ..Self::empty()
        }
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some() && self.id.is_some()
    }

    pub fn is_notification(&self) -> bool {
        self.method.is_some() && self.id.is_none()
    }

    /// The structured error, if one is set (an explicit null counts as none)
    pub fn rpc_error(&self) -> Option<&RpcError> {
        self.error.as_ref().and_then(Option::as_ref)
    }

    pub fn is_response(&self) -> bool {
        self.method.is_none() && (self.result.is_some() || self.error.is_some())
    }

    /// Encode as one frame: compact JSON followed by a single `\n`.
    ///
    /// Raw payloads built by hand may contain line breaks; those are
    /// re-encoded compactly so the frame never contains a bare newline.
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut frame = serde_json::to_vec(self)?;
        if frame.contains(&b'\n') {
            let compacted = Self {
                params: self.params.as_deref().map(compact).transpose()?,
                result: self.result.as_deref().map(compact).transpose()?,
                ..self.clone()
            };
            frame = serde_json::to_vec(&compacted)?;
        }
        frame.push(b'\n');
        Ok(frame)
    }

    /// Decode one frame; a trailing `\n` or `\r\n` is ignored
    pub fn from_frame(line: &[u8]) -> Result<Self, serde_json::Error> {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        serde_json::from_slice(line)
    }
}

fn compact(raw: &RawValue) -> Result<Box<RawValue>, serde_json::Error> {
    let value: Value = serde_json::from_str(raw.get())?;
    serde_json::value::to_raw_value(&value)
}
