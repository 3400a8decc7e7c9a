//! A scripted debug client for driving an engine in tests.

use std::net::SocketAddr;
use std::time::Duration;

use eyre::WrapErr;
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::message::Message;
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// How long [`MockClient::expect`] waits before giving up.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Plays the debug client side of a connection.
///
/// Every message the client receives is recorded so tests can assert on the
/// complete sequence afterwards.
pub struct MockClient {
    debugger_id: Option<String>,
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    received: Vec<Message>,
}

impl MockClient {
    /// Open a connection without identifying.
    pub async fn connect(addr: SocketAddr) -> eyre::Result<Self> {
        let (reader, writer) = crate::connect(addr).await?;
        Ok(Self {
            debugger_id: None,
            reader,
            writer,
            received: Vec::new(),
        })
    }

    /// Open a connection and send the `DebuggerId` handshake.
    pub async fn register(addr: SocketAddr, debugger_id: &str) -> eyre::Result<Self> {
        let mut client = Self::connect(addr).await?;
        client.identify(debugger_id).await?;
        Ok(client)
    }

    /// Send the `DebuggerId` handshake on an open connection.
    pub async fn identify(&mut self, debugger_id: &str) -> eyre::Result<()> {
        self.debugger_id = Some(debugger_id.to_string());
        self.send("DebuggerId", json!({ "debuggerId": debugger_id }))
            .await
    }

    pub fn debugger_id(&self) -> Option<&str> {
        self.debugger_id.as_deref()
    }

    /// Send one framed message.
    pub async fn send(&mut self, method: &str, params: Value) -> eyre::Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let bytes = serde_json::to_vec(&payload).wrap_err("serializing payload")?;
        self.writer
            .send(bytes.into())
            .await
            .wrap_err_with(|| format!("sending {method}"))
    }

    /// Write bytes to the socket without framing them.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> eyre::Result<()> {
        let stream = self.writer.get_mut();
        stream.write_all(bytes).await.wrap_err("writing raw bytes")?;
        stream.flush().await.wrap_err("flushing raw bytes")
    }

    /// Receive the next message, or `None` if none arrives in time or the
    /// connection closes.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        match tokio::time::timeout(timeout, self.reader.next()).await {
            Ok(Some(Ok(message))) => {
                self.received.push(message.clone());
                Some(message)
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(error = %e, "mock client read error");
                None
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Wait for a message with the given method, skipping others.
    pub async fn expect(&mut self, method: &str) -> eyre::Result<Message> {
        self.expect_within(method, DEFAULT_TIMEOUT).await
    }

    /// Like [`MockClient::expect`] with a custom deadline.
    pub async fn expect_within(&mut self, method: &str, timeout: Duration) -> eyre::Result<Message> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let message = self
                .recv_timeout(remaining)
                .await
                .ok_or_else(|| eyre::eyre!("timed out waiting for {method}"))?;
            if message.method == method {
                return Ok(message);
            }
            tracing::debug!(got = %message.method, want = %method, "skipping message");
        }
    }

    /// Wait for the very next message and require its method.
    pub async fn expect_next(&mut self, method: &str) -> eyre::Result<Message> {
        let message = self
            .recv_timeout(DEFAULT_TIMEOUT)
            .await
            .ok_or_else(|| eyre::eyre!("timed out waiting for {method}"))?;
        if message.method != method {
            eyre::bail!("expected {method}, got {}", message.method);
        }
        Ok(message)
    }

    /// Check that nothing arrives within `quiet`.
    pub async fn expect_silence(&mut self, quiet: Duration) -> eyre::Result<()> {
        match self.recv_timeout(quiet).await {
            None => Ok(()),
            Some(message) => eyre::bail!("unexpected message {}", message.method),
        }
    }

    /// Wait until the engine closes the connection.
    pub async fn expect_closed(&mut self) -> eyre::Result<()> {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.reader.next()).await {
                Ok(None) => return Ok(()),
                Ok(Some(Ok(message))) => self.received.push(message),
                Ok(Some(Err(e))) if e.is_recoverable() => continue,
                Ok(Some(Err(_))) => return Ok(()),
                Err(_) => eyre::bail!("connection still open"),
            }
        }
    }

    /// Every message received so far, in arrival order.
    pub fn received(&self) -> &[Message] {
        &self.received
    }

    /// Methods of every message received so far.
    pub fn received_methods(&self) -> Vec<&str> {
        self.received.iter().map(|m| m.method.as_str()).collect()
    }

    /// Close the write half.
    pub async fn close(mut self) -> eyre::Result<()> {
        self.writer.close().await.wrap_err("closing connection")
    }
}
