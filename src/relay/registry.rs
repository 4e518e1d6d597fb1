//! Keyed connection and session state
//!
//! Two independent maps keyed by [`ConnectionId`]: live connections (with
//! their outbound channel) and open sessions. A connection may be live with
//! no session; a session never outlives its registry entry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::OutboundEvent;

use super::session::SessionOutcome;

/// Transport-assigned identity of one live client connection; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Registry slot of one open session.
pub struct SessionEntry {
    serial: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<SessionOutcome>>,
}

impl SessionEntry {
    /// Cancel the session and wait for it to finish tearing down.
    ///
    /// Returns `None` when no task was attached or the task panicked.
    pub async fn shutdown(self) -> Option<SessionOutcome> {
        self.cancel.cancel();
        match self.task {
            Some(task) => task.await.ok(),
            None => None,
        }
    }
}

/// Handle a session keeps to release exactly its own registry entry.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub connection: ConnectionId,
    pub serial: u64,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct SessionRegistry {
    connections: DashMap<ConnectionId, Sender<OutboundEvent>>,
    sessions: DashMap<ConnectionId, SessionEntry>,
    next_serial: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Connections ----

    pub fn register_connection(&self, id: ConnectionId, outbound: Sender<OutboundEvent>) {
        self.connections.insert(id, outbound);
    }

    /// Mark the connection not-live and drop its outbound channel.
    pub fn unregister_connection(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Deliver one event to exactly one connection.
    ///
    /// Never waits. A connection whose outbound buffer is full is too slow to
    /// keep up and gets unregistered. Returns `false` if the connection is
    /// gone, its receiver was dropped, or it was just evicted.
    pub fn send(&self, id: ConnectionId, event: OutboundEvent) -> bool {
        let Some(outbound) = self.connections.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };
        match outbound.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, capacity = outbound.max_capacity(), "outbound buffer full, dropping slow connection");
                self.connections.remove(&id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ---- Sessions ----

    /// Create a fresh session slot, replacing (and cancelling) any previous one.
    pub fn open(&self, id: ConnectionId) -> SessionTicket {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let entry = SessionEntry {
            serial,
            cancel: cancel.clone(),
            task: None,
        };
        if let Some(previous) = self.sessions.insert(id, entry) {
            debug!(connection_id = %id, serial = previous.serial, "replaced open session");
            previous.cancel.cancel();
        }
        SessionTicket {
            connection: id,
            serial,
            cancel,
        }
    }

    /// Store the running task for `ticket`'s session.
    ///
    /// A session that already released its slot gets nothing attached; its
    /// task has finished or is about to.
    pub fn attach(&self, ticket: &SessionTicket, task: JoinHandle<SessionOutcome>) {
        if let Some(mut entry) = self.sessions.get_mut(&ticket.connection) {
            if entry.serial == ticket.serial {
                entry.task = Some(task);
            }
        }
    }

    /// Remove the session slot, if any, handing it to the caller for shutdown.
    pub fn close(&self, id: ConnectionId) -> Option<SessionEntry> {
        self.sessions.remove(&id).map(|(_, entry)| entry)
    }

    /// Remove the slot only if it still belongs to `ticket`.
    pub fn release(&self, ticket: &SessionTicket) -> bool {
        self.sessions
            .remove_if(&ticket.connection, |_, entry| entry.serial == ticket.serial)
            .is_some()
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
