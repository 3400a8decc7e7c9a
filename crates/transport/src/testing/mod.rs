//! Testing utilities for the transport layer.
//!
//! This module provides helpers for testing code that talks to debug
//! clients: in-memory transports, payload framing helpers, and a
//! [`MockClient`] that plays the debug client side over TCP.

mod memory;
mod mock_client;

pub use memory::MemoryTransport;
pub use mock_client::MockClient;

use serde_json::{Value, json};

use crate::codec::encode_frame;

/// Construct a complete frame for a method call.
///
/// # Example
///
/// ```
/// use transport::testing::frame_message;
/// use serde_json::json;
///
/// let bytes = frame_message("DebuggerId", json!({"debuggerId": "id-1"}));
/// assert_eq!(&bytes[..4], &((bytes.len() - 8) as u32).to_be_bytes());
/// ```
pub fn frame_message(method: &str, params: Value) -> Vec<u8> {
    let payload = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    });
    encode_frame(payload.to_string().as_bytes()).to_vec()
}

/// Construct multiple frames concatenated together.
pub fn frame_messages(msgs: &[(&str, Value)]) -> Vec<u8> {
    msgs.iter()
        .flat_map(|(method, params)| frame_message(method, params.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FrameCodec, HEADER_LEN};
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    #[test]
    fn test_frame_message() {
        let bytes = frame_message("ClientOutput", json!({"text": "hi"}));
        let s = String::from_utf8_lossy(&bytes[HEADER_LEN..]);

        assert!(s.contains(r#""method":"ClientOutput""#));
    }

    #[test]
    fn test_frame_messages() {
        let bytes = frame_messages(&[
            ("ResponseOK", json!({})),
            ("ResponseContinue", json!({})),
        ]);

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }
}
