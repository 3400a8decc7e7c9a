//! Frame payload types.
//!
//! Every payload is a JSON-RPC style object with a `method` and an object of
//! `params`. [`Message`] is the untyped form read off the wire; the typed
//! forms live in [`crate::requests`] and [`crate::events`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::requests::Request;

/// Protocol version written into every outgoing payload.
pub const JSONRPC_VERSION: &str = "2.0";

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// An untyped message as decoded from a frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Protocol version; older clients omit it.
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// The method name, e.g. `ResponseLine`.
    pub method: String,
    /// Method parameters. Required, `{}` when a method has none.
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            jsonrpc: jsonrpc_version(),
            method: method.into(),
            params,
        }
    }

    /// Look up a string parameter.
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.as_str())
    }
}

/// Decode a verified frame payload into a [`Message`].
pub fn decode_message(payload: &[u8]) -> Result<Message, CodecError> {
    serde_json::from_slice(payload).map_err(CodecError::Malformed)
}

/// An outgoing request wrapped with the protocol version.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub jsonrpc: &'static str,
    #[serde(flatten)]
    pub request: Request,
}

impl OutgoingMessage {
    pub fn new(request: Request) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            request,
        }
    }

    /// Serialize to the JSON payload carried by a frame.
    pub fn to_payload(&self) -> Result<Bytes, CodecError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(CodecError::JsonSerialize)
    }
}

impl From<Request> for OutgoingMessage {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}
