//! Frame codec implementation using tokio-util.
//!
//! This module provides [`FrameCodec`], which implements both the `Encoder` and
//! `Decoder` traits from tokio-util for checksummed frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// Size of the fixed frame header: payload length followed by its checksum.
pub const HEADER_LEN: usize = 8;

/// Default maximum payload size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Codec for the debug client wire format.
///
/// Every frame is a fixed header followed by the payload:
/// ```text
/// +-------------------+---------------------+---------------------+
/// | length (u32, BE)  | adler32 (u32, BE)   | payload (UTF-8 JSON) |
/// +-------------------+---------------------+---------------------+
/// ```
///
/// Frames whose checksum does not match are dropped and decoding resumes at
/// the following header. A single corrupted frame never ends the stream.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a new codec with a custom maximum payload size.
    ///
    /// Frames larger than this are rejected with [`CodecError::FrameTooLarge`].
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the checksum carried in a frame header.
pub fn checksum(payload: &[u8]) -> u32 {
    adler2::adler32_slice(payload)
}

/// Encode a payload into a complete frame.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(HEADER_LEN + payload.len());
    put_frame(payload, &mut dst);
    dst.freeze()
}

fn put_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_u32(checksum(payload));
    dst.put_slice(payload);
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                src.reserve(HEADER_LEN - src.len());
                return Ok(None);
            }

            let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
            let expected = u32::from_be_bytes([src[4], src[5], src[6], src[7]]);

            if length > self.max_frame_size {
                return Err(CodecError::FrameTooLarge {
                    size: length,
                    max: self.max_frame_size,
                });
            }

            let total_length = HEADER_LEN + length;
            if src.len() < total_length {
                // Partial payload; keep what we have and wait for more bytes
                src.reserve(total_length - src.len());
                return Ok(None);
            }

            src.advance(HEADER_LEN);
            let payload = src.split_to(length).freeze();

            let actual = checksum(&payload);
            if actual != expected {
                tracing::warn!(
                    length,
                    expected,
                    actual,
                    "discarding frame with checksum mismatch"
                );
                continue;
            }

            return Ok(Some(payload));
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        put_frame(&item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"jsonrpc":"2.0","method":"DebuggerId","params":{"debuggerId":"id-1"}}"#;

    #[test]
    fn header_layout() {
        let frame = encode_frame(PAYLOAD.as_bytes());

        assert_eq!(&frame[..4], &(PAYLOAD.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..8], &checksum(PAYLOAD.as_bytes()).to_be_bytes());
        assert_eq!(&frame[8..], PAYLOAD.as_bytes());
    }

    #[test]
    fn adler32_reference_value() {
        // Reference value from RFC 1950 implementations
        assert_eq!(checksum(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn decode_complete_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&encode_frame(PAYLOAD.as_bytes())[..]);

        let payload = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], PAYLOAD.as_bytes());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0, 0][..]);

        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_payload_keeps_bytes() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32(120);
        buf.put_u32(0);
        buf.put_slice(&[b'x'; 64]);

        let result = codec.decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_LEN + 64);
    }

    #[test]
    fn decode_multiple_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&encode_frame(b"{\"a\":1}"));
        buf.put_slice(&encode_frame(b"{\"b\":2}"));

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"{\"a\":1}");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"{\"b\":2}");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn corrupted_frame_is_skipped() {
        let mut codec = FrameCodec::new();
        let mut corrupted = BytesMut::from(&encode_frame(PAYLOAD.as_bytes())[..]);
        corrupted[HEADER_LEN + 5] ^= 0x01;

        let mut buf = BytesMut::new();
        buf.put_slice(&corrupted);
        buf.put_slice(&encode_frame(b"{\"next\":true}"));

        let payload = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&payload[..], b"{\"next\":true}");
        assert!(buf.is_empty());
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let frame = encode_frame(PAYLOAD.as_bytes());
        for bit in 0..PAYLOAD.len() * 8 {
            let mut codec = FrameCodec::new();
            let mut buf = BytesMut::from(&frame[..]);
            buf[HEADER_LEN + bit / 8] ^= 1 << (bit % 8);

            assert!(
                codec.decode(&mut buf).unwrap().is_none(),
                "bit {bit} flip was accepted"
            );
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn decode_frame_too_large() {
        let mut codec = FrameCodec::with_max_size(10);
        let mut buf = BytesMut::new();
        buf.put_u32(100);
        buf.put_u32(0);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[test]
    fn encode_matches_encode_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Bytes::from_static(PAYLOAD.as_bytes()), &mut buf)
            .unwrap();

        assert_eq!(buf.freeze(), encode_frame(PAYLOAD.as_bytes()));
    }
}
