//! In-memory transport for testing.

use tokio::io::{DuplexStream, duplex};

use crate::transport::FrameTransport;

/// An in-memory transport backed by tokio's [`DuplexStream`].
///
/// # Example
///
/// ```
/// use transport::testing::MemoryTransport;
/// use transport::split;
///
/// let (controller, client) = MemoryTransport::pair();
///
/// let (controller_reader, controller_writer) = split(controller);
/// let (client_reader, client_writer) = split(client);
/// ```
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected pair of in-memory transports with 64KB buffers.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    /// Create a connected pair with a custom buffer size.
    ///
    /// Smaller buffers can be useful for testing backpressure behavior.
    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_write, a_to_b_read) = duplex(buffer_size);
        let (b_to_a_write, b_to_a_read) = duplex(buffer_size);

        let transport_a = MemoryTransport {
            read: b_to_a_read,
            write: a_to_b_write,
        };

        let transport_b = MemoryTransport {
            read: a_to_b_read,
            write: b_to_a_write,
        };

        (transport_a, transport_b)
    }
}

impl FrameTransport for MemoryTransport {
    type Read = DuplexStream;
    type Write = DuplexStream;

    fn into_split(self) -> (Self::Read, Self::Write) {
        (self.read, self.write)
    }
}
