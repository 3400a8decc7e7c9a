//! Frame writer.
//!
//! This module provides [`FrameWriter`], a wrapper around a framed async
//! writer that sends already-serialized payloads.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::FrameCodec;
use crate::error::CodecError;
use crate::message::OutgoingMessage;

pin_project! {
    /// An async sink for outgoing frames.
    ///
    /// The sink item is the JSON payload; the header is added by the codec.
    pub struct FrameWriter<W> {
        #[pin]
        inner: FramedWrite<W, FrameCodec>,
    }
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a new writer from an async write destination.
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, FrameCodec::new()),
        }
    }

    /// Create a new writer with a custom codec.
    pub fn with_codec(writer: W, codec: FrameCodec) -> Self {
        Self {
            inner: FramedWrite::new(writer, codec),
        }
    }

    /// Send one payload and flush it to the destination.
    pub async fn send(&mut self, payload: Bytes) -> Result<(), CodecError> {
        use futures::SinkExt;
        SinkExt::send(&mut self.inner, payload).await
    }

    /// Serialize and send a message.
    pub async fn send_message(&mut self, message: &OutgoingMessage) -> Result<(), CodecError> {
        let payload = message.to_payload()?;
        self.send(payload).await
    }

    /// Flush pending frames and shut the write half down.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        use futures::SinkExt;
        SinkExt::close(&mut self.inner).await
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Get a mutable reference to the underlying writer.
    ///
    /// Bytes written here bypass framing.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }

    /// Consume the writer and return the underlying destination.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W> Sink<Bytes> for FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{HEADER_LEN, checksum};
    use crate::requests::Request;
    use std::io::Cursor;

    #[tokio::test]
    async fn write_single_message() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        writer
            .send_message(&OutgoingMessage::new(Request::RequestStep {}))
            .await
            .unwrap();

        let output = writer.into_inner().into_inner();
        let payload = &output[HEADER_LEN..];
        assert_eq!(&output[..4], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&output[4..8], &checksum(payload).to_be_bytes());

        let text = std::str::from_utf8(payload).unwrap();
        assert!(text.contains(r#""method":"RequestStep""#));
        assert!(text.contains(r#""jsonrpc":"2.0""#));
    }

    #[tokio::test]
    async fn write_preserves_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));

        for payload in ["{\"n\":1}", "{\"n\":2}", "{\"n\":3}"] {
            writer.send(Bytes::from_static(payload.as_bytes())).await.unwrap();
        }

        let output = writer.into_inner().into_inner();
        let text = String::from_utf8_lossy(&output);
        let first = text.find("\"n\":1").unwrap();
        let second = text.find("\"n\":2").unwrap();
        let third = text.find("\"n\":3").unwrap();
        assert!(first < second && second < third);
    }
}
