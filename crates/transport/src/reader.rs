//! Frame reader.
//!
//! This module provides [`FrameReader`], a typed wrapper around a framed
//! async reader that produces a stream of decoded [`Message`]s.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::FrameCodec;
use crate::error::CodecError;
use crate::message::{Message, decode_message};

pin_project! {
    /// An async stream of incoming messages.
    ///
    /// Frames that fail their checksum never reach this stream. Payloads that
    /// are not valid messages are yielded as a recoverable
    /// [`CodecError::Malformed`] and the stream continues with the next frame.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    /// use transport::FrameReader;
    ///
    /// let mut reader = FrameReader::new(tcp_read_half);
    ///
    /// while let Some(result) = reader.next().await {
    ///     match result {
    ///         Ok(message) => { /* dispatch */ }
    ///         Err(e) if e.is_recoverable() => { /* report, keep reading */ }
    ///         Err(e) => return Err(e.into()),
    ///     }
    /// }
    /// ```
    pub struct FrameReader<R> {
        #[pin]
        inner: FramedRead<R, FrameCodec>,
    }
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new reader from an async read source.
    pub fn new(reader: R) -> Self {
        Self {
            inner: FramedRead::new(reader, FrameCodec::new()),
        }
    }

    /// Create a new reader with a custom codec.
    ///
    /// This allows configuring options like maximum frame size.
    pub fn with_codec(reader: R, codec: FrameCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }

    /// Number of bytes received that do not yet form a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.inner.read_buffer().len()
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Message, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let frame = ready!(self.project().inner.poll_next(cx));
        Poll::Ready(frame.map(|payload| payload.and_then(|payload| decode_message(&payload))))
    }
}
