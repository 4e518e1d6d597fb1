//! Periodic `heartbeat{processing}` emission for long-running sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::{HeartbeatStatus, OutboundEvent};

use super::registry::{ConnectionId, SessionRegistry};

/// Why the heartbeat loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The owning session cancelled it (or its own token was cancelled).
    Cancelled,
    /// The connection is no longer registered.
    Disconnected,
}

/// Heartbeat child task owned by one streaming session.
///
/// Must be stopped with [`Heartbeat::stop`] on every exit path so no
/// emission can follow the session's terminal event.
pub struct Heartbeat {
    cancel: CancellationToken,
    task: JoinHandle<HeartbeatExit>,
}

impl Heartbeat {
    /// Spawn a heartbeat for `connection`; cancelling `parent` also stops it.
    pub fn spawn(
        registry: Arc<SessionRegistry>,
        connection: ConnectionId,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let task = tokio::spawn(run_heartbeat(registry, connection, interval, cancel.clone()));
        Self { cancel, task }
    }

    /// Cancel and join.
    pub async fn stop(self) -> HeartbeatExit {
        self.cancel.cancel();
        self.task.await.unwrap_or(HeartbeatExit::Cancelled)
    }
}

/// Emit a heartbeat, then sleep `interval`, until cancelled or disconnected.
pub async fn run_heartbeat(
    registry: Arc<SessionRegistry>,
    connection: ConnectionId,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatExit {
    loop {
        if cancel.is_cancelled() {
            return HeartbeatExit::Cancelled;
        }
        if !registry.send(connection, OutboundEvent::heartbeat(HeartbeatStatus::Processing)) {
            debug!(connection_id = %connection, "heartbeat stopped, connection gone");
            return HeartbeatExit::Disconnected;
        }

        tokio::select! {
            () = cancel.cancelled() => return HeartbeatExit::Cancelled,
            () = tokio::time::sleep(interval) => {}
        }
    }
}
