//! Checksummed frame transport for debug client connections.
//!
//! Every message on the wire is a frame:
//!
//! ```text
//! +----------------+------------------+---------------------------+
//! | length (u32BE) | adler32 (u32BE)  | JSON payload (length B)   |
//! +----------------+------------------+---------------------------+
//! ```
//!
//! The payload is a JSON object `{"jsonrpc": "2.0", "method": ..., "params": {...}}`.
//!
//! # Architecture
//!
//! - [`FrameCodec`] implements tokio-util's `Decoder`/`Encoder` for the header
//! - [`FrameReader`] is a `Stream` of decoded [`Message`]s
//! - [`FrameWriter`] is a `Sink` of serialized payloads
//! - [`requests`] holds the typed commands sent to debug clients
//! - [`events`] holds the typed messages debug clients send back
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use transport::requests::Request;
//!
//! # async fn example() -> eyre::Result<()> {
//! let (mut reader, mut writer) = transport::connect("127.0.0.1:42000").await?;
//!
//! writer.send_message(&Request::RequestCapabilities {}.into()).await?;
//! while let Some(message) = reader.next().await {
//!     println!("{:?}", message?);
//! }
//! # Ok(())
//! # }
//! ```

mod codec;
mod error;
pub mod events;
mod message;
mod reader;
pub mod requests;
pub mod testing;
mod transport;
mod writer;

pub use codec::{DEFAULT_MAX_FRAME_SIZE, FrameCodec, HEADER_LEN, checksum, encode_frame};
pub use error::CodecError;
pub use message::{JSONRPC_VERSION, Message, OutgoingMessage, decode_message};
pub use reader::FrameReader;
pub use transport::{FrameTransport, split, split_with_codec};
pub use writer::FrameWriter;

use eyre::WrapErr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to a listening engine as a debug client would.
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> eyre::Result<(FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>)> {
    let stream = TcpStream::connect(addr)
        .await
        .wrap_err("connecting to engine")?;
    stream.set_nodelay(true).wrap_err("setting TCP_NODELAY")?;
    Ok(split(stream))
}
