//! Transport gateway
//!
//! Owns connection lifetime and routes inbound events to sessions. The
//! transport (a websocket handler, or a test) calls [`Gateway::connect`],
//! forwards the returned receiver to its client, feeds inbound frames to
//! [`Gateway::dispatch`], and calls [`Gateway::disconnect`] exactly once.

use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::models::{ChatRequest, InboundEvent, OutboundEvent};
use crate::source::GenerationSource;

use super::registry::{ConnectionId, SessionRegistry};
use super::session::{SessionSettings, StreamingSession};

/// Outbound events queued per connection before it counts as too slow
pub const OUTBOUND_BUFFER: usize = 1024;

#[derive(Clone)]
pub struct Gateway {
    registry: Arc<SessionRegistry>,
    source: Arc<dyn GenerationSource>,
    settings: SessionSettings,
    outbound_buffer: usize,
}

impl Gateway {
    pub fn new(source: Arc<dyn GenerationSource>, settings: SessionSettings) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            source,
            settings,
            outbound_buffer: OUTBOUND_BUFFER,
        }
    }

    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register a new live connection and hand back its outbound event stream.
    ///
    /// The stream ends when the connection is disconnected or evicted for
    /// falling `outbound_buffer` events behind.
    pub fn connect(&self) -> (ConnectionId, Receiver<OutboundEvent>) {
        let id = ConnectionId::new();
        let (outbound, receiver) = mpsc::channel(self.outbound_buffer);
        self.registry.register_connection(id, outbound);
        info!(connection_id = %id, connections = self.registry.connection_count(), "client connected");
        (id, receiver)
    }

    /// Tear down a connection: mark it not-live, then cancel and join its session.
    ///
    /// Returns once the session (and its heartbeat) has fully stopped.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.registry.unregister_connection(id);
        if let Some(entry) = self.registry.close(id) {
            let outcome = entry.shutdown().await;
            debug!(connection_id = %id, ?outcome, "session torn down on disconnect");
        }
        info!(connection_id = %id, connections = self.registry.connection_count(), "client disconnected");
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed payloads are rejected before any session opens. Every
    /// rejection is logged here, so transports may ignore the error.
    pub async fn dispatch(&self, id: ConnectionId, frame: &str) -> Result<(), RelayError> {
        let result = match InboundEvent::parse(frame).and_then(ChatRequest::try_from) {
            Ok(request) => self.generate(id, request).await,
            Err(e) => Err(e),
        };
        result.inspect_err(|e| warn!(connection_id = %id, error = %e, "rejected inbound event"))
    }

    /// Start a streaming session, superseding any session already running on `id`.
    pub async fn generate(&self, id: ConnectionId, request: ChatRequest) -> Result<(), RelayError> {
        if !self.registry.is_connected(id) {
            return Err(RelayError::UnknownConnection(id));
        }

        if let Some(previous) = self.registry.close(id) {
            let outcome = previous.shutdown().await;
            debug!(connection_id = %id, ?outcome, "previous session stopped");
        }

        debug!(
            connection_id = %id,
            multimodal = request.is_multimodal(),
            messages = request.conversation().messages().len(),
            "opening session"
        );
        let ticket = self.registry.open(id);
        let session = StreamingSession::new(
            self.registry.clone(),
            self.source.clone(),
            ticket.clone(),
            request,
            self.settings.clone(),
        );
        let task = tokio::spawn(session.run());
        self.registry.attach(&ticket, task);
        Ok(())
    }

    /// Send one event to exactly one connection.
    pub fn emit(&self, id: ConnectionId, event: OutboundEvent) -> bool {
        self.registry.send(id, event)
    }
}
