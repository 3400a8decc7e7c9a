//! Transport abstraction and split functionality.
//!
//! This module provides the [`FrameTransport`] trait for abstracting over
//! different async byte streams, and the [`split`] function for creating
//! reader/writer pairs.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::FrameCodec;
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// A transport that can be split into separate read and write halves.
///
/// Debug clients connect over TCP; tests use in-memory streams.
pub trait FrameTransport: Send + 'static {
    /// The read half type.
    type Read: AsyncRead + Unpin + Send + 'static;
    /// The write half type.
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split the transport into separate read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl FrameTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a frame reader and writer pair.
///
/// The returned halves can be driven from separate tasks.
pub fn split<T: FrameTransport>(transport: T) -> (FrameReader<T::Read>, FrameWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (FrameReader::new(read), FrameWriter::new(write))
}

/// Like [`split`], with a custom codec for both halves.
pub fn split_with_codec<T: FrameTransport>(
    transport: T,
    codec: FrameCodec,
) -> (FrameReader<T::Read>, FrameWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (
        FrameReader::with_codec(read, codec.clone()),
        FrameWriter::with_codec(write, codec),
    )
}
