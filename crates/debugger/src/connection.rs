//! Per-connection reader and writer tasks.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use transport::{FrameCodec, FrameReader, FrameWriter};

use crate::engine::Input;
use crate::registry::{ConnectionHandle, Outbound};
use crate::types::ConnectionId;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionSettings {
    pub frame_deadline: Duration,
    pub max_frame_size: usize,
}

/// Start the tasks for an accepted socket.
///
/// The engine learns about the connection before the reader can report any
/// frame from it.
pub(crate) fn spawn(
    stream: TcpStream,
    id: ConnectionId,
    peer: Option<SocketAddr>,
    settings: ConnectionSettings,
    inputs: mpsc::UnboundedSender<Input>,
    cancel: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "could not set TCP_NODELAY");
    }
    let codec = FrameCodec::with_max_size(settings.max_frame_size);
    let (reader, writer) = transport::split_with_codec(stream, codec);

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(id, peer, outbound_tx);
    if inputs.send(Input::Accepted(handle)).is_err() {
        tracing::debug!(connection = %id, "engine stopped, dropping connection");
        return;
    }

    tokio::spawn(write_loop(writer, outbound_rx, id, cancel.clone()));
    tokio::spawn(read_loop(reader, id, settings.frame_deadline, inputs, cancel));
}

#[tracing::instrument(skip_all, fields(connection = %id))]
async fn read_loop(
    mut reader: FrameReader<OwnedReadHalf>,
    id: ConnectionId,
    frame_deadline: Duration,
    inputs: mpsc::UnboundedSender<Input>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("reader task cancelled");
                break;
            }
            next = tokio::time::timeout(frame_deadline, reader.next()) => {
                let input = match next {
                    Err(_) => {
                        let buffered = reader.buffered_len();
                        if buffered > 0 {
                            tracing::debug!(buffered, "no complete frame yet");
                        }
                        continue;
                    }
                    Ok(Some(Ok(message))) => {
                        tracing::trace!(method = %message.method, "received frame");
                        Input::Frame(id, message)
                    }
                    Ok(Some(Err(e))) if e.is_recoverable() => Input::Malformed(id, e),
                    Ok(Some(Err(e))) => {
                        tracing::warn!(error = %e, "transport error, closing connection");
                        break;
                    }
                    Ok(None) => {
                        tracing::debug!("connection closed by peer");
                        break;
                    }
                };
                if inputs.send(input).is_err() {
                    tracing::debug!("engine stopped");
                    break;
                }
            }
        }
    }
    cancel.cancel();
    let _ = inputs.send(Input::Closed(id));
}

#[tracing::instrument(skip_all, fields(connection = %id))]
async fn write_loop(
    mut writer: FrameWriter<OwnedWriteHalf>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    id: ConnectionId,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = outbound.recv() => next,
        };
        match next {
            Some(Outbound::Frame(payload)) => {
                if let Err(e) = writer.send(payload).await {
                    tracing::warn!(error = %e, "write failed, closing connection");
                    break;
                }
            }
            Some(Outbound::Close) => {
                if let Err(e) = writer.close().await {
                    tracing::debug!(error = %e, "closing write half");
                }
                break;
            }
            None => break,
        }
    }
    cancel.cancel();
}
