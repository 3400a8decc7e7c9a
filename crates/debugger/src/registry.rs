//! Connection bookkeeping.
//!
//! Accepted sockets start out pending. The first `DebuggerId` frame on a
//! socket promotes it to a live entry under that identity; the first identity
//! to register while no main debugger exists becomes the main debugger.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::types::{ConnectionId, DebuggerId};

/// Instructions for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    Frame(Bytes),
    Close,
}

/// Sending side of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self { id, peer, outbound }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Hand a payload to the writer task. Returns false if the connection
    /// has already gone away.
    pub fn send(&self, payload: Bytes) -> bool {
        self.outbound.send(Outbound::Frame(payload)).is_ok()
    }

    /// Flush anything already handed over, then close the socket.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Result of a registration attempt.
#[derive(Debug)]
pub enum Registration {
    /// The identity is now live on this connection.
    New {
        became_main: bool,
        /// The connection previously registered under the same identity.
        replaced: Option<ConnectionHandle>,
    },
    /// The connection repeated the identity it already registered with.
    Replay,
    /// The connection already registered under a different identity.
    Conflict { existing: DebuggerId },
    /// Registrations are refused during shutdown. The connection is no
    /// longer tracked and is handed back to be closed.
    Refused { handle: ConnectionHandle },
    UnknownConnection,
}

/// Result of removing a closed connection.
#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    /// The connection never registered.
    Pending,
    Live {
        debugger_id: DebuggerId,
        was_main: bool,
        remaining: usize,
    },
    /// Already removed, or superseded by a newer connection.
    Unknown,
}

#[derive(Debug)]
pub struct Registry {
    pending: HashMap<ConnectionId, ConnectionHandle>,
    live: HashMap<DebuggerId, ConnectionHandle>,
    by_connection: HashMap<ConnectionId, DebuggerId>,
    main: Option<DebuggerId>,
    accepting: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            live: HashMap::new(),
            by_connection: HashMap::new(),
            main: None,
            accepting: true,
        }
    }
}

impl Registry {
    pub fn accept(&mut self, handle: ConnectionHandle) {
        tracing::debug!(connection = %handle.id(), peer = ?handle.peer(), "connection pending");
        self.pending.insert(handle.id(), handle);
    }

    pub fn register(&mut self, connection: ConnectionId, debugger_id: DebuggerId) -> Registration {
        if let Some(existing) = self.by_connection.get(&connection) {
            if *existing == debugger_id {
                return Registration::Replay;
            }
            return Registration::Conflict {
                existing: existing.clone(),
            };
        }
        let Some(handle) = self.pending.remove(&connection) else {
            return Registration::UnknownConnection;
        };
        if !self.accepting {
            return Registration::Refused { handle };
        }

        let replaced = self.live.insert(debugger_id.clone(), handle);
        if let Some(old) = &replaced {
            self.by_connection.remove(&old.id());
        }
        self.by_connection.insert(connection, debugger_id.clone());

        let became_main = self.main.is_none();
        if became_main {
            self.main = Some(debugger_id);
        }
        Registration::New {
            became_main,
            replaced,
        }
    }

    pub fn remove_connection(&mut self, connection: ConnectionId) -> Removal {
        if self.pending.remove(&connection).is_some() {
            return Removal::Pending;
        }
        let Some(debugger_id) = self.by_connection.remove(&connection) else {
            return Removal::Unknown;
        };
        self.live.remove(&debugger_id);

        let was_main = self.main.as_ref() == Some(&debugger_id);
        if was_main {
            self.main = None;
        }
        Removal::Live {
            debugger_id,
            was_main,
            remaining: self.live.len(),
        }
    }

    pub fn resolve(&self, debugger_id: &DebuggerId) -> Option<&ConnectionHandle> {
        self.live.get(debugger_id)
    }

    pub fn identity_of(&self, connection: ConnectionId) -> Option<&DebuggerId> {
        self.by_connection.get(&connection)
    }

    pub fn main(&self) -> Option<&DebuggerId> {
        self.main.as_ref()
    }

    pub fn main_handle(&self) -> Option<&ConnectionHandle> {
        self.main.as_ref().and_then(|id| self.live.get(id))
    }

    pub fn live(&self) -> impl Iterator<Item = (&DebuggerId, &ConnectionHandle)> {
        self.live.iter()
    }

    pub fn live_ids(&self) -> Vec<DebuggerId> {
        let mut ids: Vec<_> = self.live.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.live.is_empty()
    }

    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Remove every connection, live and pending.
    pub fn drain(&mut self) -> Vec<ConnectionHandle> {
        self.main = None;
        self.by_connection.clear();
        self.live
            .drain()
            .map(|(_, handle)| handle)
            .chain(self.pending.drain().map(|(_, handle)| handle))
            .collect()
    }
}
