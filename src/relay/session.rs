//! Per-request streaming state machine
//!
//! `Idle -> Starting -> Streaming -> {Completed, Errored, Aborted}`. One
//! session drives one generation for one connection.
//!
//! Teardown order on every exit path: heartbeat joined, then the terminal
//! event (if anyone is listening), then the registry slot released.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::models::{ChatRequest, HeartbeatStatus, OutboundEvent};
use crate::source::{Fragment, Generation, GenerationSource};

use super::heartbeat::Heartbeat;
use super::recency::RecencySet;
use super::registry::{ConnectionId, SessionRegistry, SessionTicket};

pub const SUPERSEDED_MESSAGE: &str = "superseded by a newer request";

/// Timing and dedup knobs, passed by value into every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Pause after `start` so the client sees it before any token
    pub start_delay: Duration,
    /// Pause after each accepted token
    pub token_pacing: Duration,
    pub heartbeat_interval: Duration,
    /// Emit `heartbeat{generating}` after every N tokens on multimodal sessions; 0 disables
    pub generating_every: usize,
    pub recency_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(100),
            token_pacing: Duration::from_millis(10),
            heartbeat_interval: Duration::from_secs(5),
            generating_every: 20,
            recency_capacity: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Completed,
    Errored,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Aborted
        )
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { model: String, response: String },
    Errored { message: String },
    /// Connection went away; nothing was emitted
    Aborted,
    /// A newer request on the same connection replaced this one
    Superseded,
}

/// Why the fragment loop stopped
enum StreamEnd {
    Exhausted { model: String },
    Failed { message: String },
    Disconnected,
    Cancelled,
}

pub struct StreamingSession {
    registry: Arc<SessionRegistry>,
    source: Arc<dyn GenerationSource>,
    ticket: SessionTicket,
    request: ChatRequest,
    settings: SessionSettings,
    state: SessionState,
    response: String,
    recent: RecencySet,
    emitted: usize,
}

impl StreamingSession {
    pub fn new(
        registry: Arc<SessionRegistry>,
        source: Arc<dyn GenerationSource>,
        ticket: SessionTicket,
        request: ChatRequest,
        settings: SessionSettings,
    ) -> Self {
        let recent = RecencySet::new(settings.recency_capacity);
        Self {
            registry,
            source,
            ticket,
            request,
            settings,
            state: SessionState::Idle,
            response: String::new(),
            recent,
            emitted: 0,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.ticket.connection
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to a terminal state.
    pub async fn run(mut self) -> SessionOutcome {
        let end = self.stream().await;
        let outcome = self.finish(end);
        self.registry.release(&self.ticket);
        outcome
    }

    async fn stream(&mut self) -> StreamEnd {
        self.transition(SessionState::Starting);
        if !self.emit(OutboundEvent::Start) {
            return StreamEnd::Disconnected;
        }
        if !self.pause(self.settings.start_delay).await {
            return StreamEnd::Cancelled;
        }

        self.transition(SessionState::Streaming);
        let heartbeat = self.request.is_multimodal().then(|| {
            Heartbeat::spawn(
                self.registry.clone(),
                self.connection(),
                self.settings.heartbeat_interval,
                &self.ticket.cancel,
            )
        });

        let end = self.pull().await;

        if let Some(heartbeat) = heartbeat {
            let exit = heartbeat.stop().await;
            debug!(connection_id = %self.connection(), ?exit, "heartbeat stopped");
        }
        end
    }

    async fn pull(&mut self) -> StreamEnd {
        let source = self.source.clone();
        let cancel = self.ticket.cancel.clone();

        let started = tokio::select! {
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            started = source.stream(&self.request) => started,
        };
        let Generation {
            model,
            mut fragments,
        } = match started {
            Ok(generation) => generation,
            Err(e) => {
                return StreamEnd::Failed {
                    message: e.to_string(),
                }
            }
        };
        debug!(connection_id = %self.connection(), model = %model, "generation started");

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                next = fragments.next() => next,
            };
            let fragment = match next {
                None => return StreamEnd::Exhausted { model },
                Some(Err(e)) => {
                    return StreamEnd::Failed {
                        message: e.to_string(),
                    }
                }
                Some(Ok(fragment)) => fragment,
            };

            let Some(text) = self.accept(fragment) else {
                continue;
            };
            self.response.push_str(&text);
            if !self.emit(OutboundEvent::token(text))
                || !self.registry.is_connected(self.connection())
            {
                return StreamEnd::Disconnected;
            }
            self.emitted += 1;

            let every = self.settings.generating_every;
            if self.request.is_multimodal() && every > 0 && self.emitted % every == 0 {
                self.emit(OutboundEvent::heartbeat(HeartbeatStatus::Generating));
            }

            if !self.pause(self.settings.token_pacing).await {
                return StreamEnd::Cancelled;
            }
        }
    }

    /// Dedup filter: returns the text to emit, or `None` to drop the fragment.
    fn accept(&mut self, fragment: Fragment) -> Option<String> {
        let text = match fragment {
            Fragment::Text(text) if !text.is_empty() => text,
            Fragment::Text(_) => return None,
            Fragment::Data(_) => {
                debug!(connection_id = %self.connection(), "dropped non-text fragment");
                return None;
            }
        };
        if self.recent.contains(&text) {
            debug!(connection_id = %self.connection(), value = %text, "suppressed duplicate fragment");
            return None;
        }
        self.recent.insert(text.clone());
        Some(text)
    }

    fn finish(&mut self, end: StreamEnd) -> SessionOutcome {
        let connection = self.connection();
        match end {
            StreamEnd::Exhausted { model } => {
                self.transition(SessionState::Completed);
                self.emit(OutboundEvent::complete(model.clone()));
                info!(connection_id = %connection, model = %model, tokens = self.emitted, "generation complete");
                SessionOutcome::Completed {
                    model,
                    response: std::mem::take(&mut self.response),
                }
            }
            StreamEnd::Failed { message } => {
                self.transition(SessionState::Errored);
                self.emit(OutboundEvent::error(message.clone()));
                warn!(connection_id = %connection, tokens = self.emitted, error = %message, "generation failed");
                SessionOutcome::Errored { message }
            }
            StreamEnd::Cancelled if self.registry.is_connected(connection) => {
                self.transition(SessionState::Errored);
                self.emit(OutboundEvent::error(SUPERSEDED_MESSAGE));
                info!(connection_id = %connection, tokens = self.emitted, "generation superseded");
                SessionOutcome::Superseded
            }
            StreamEnd::Cancelled | StreamEnd::Disconnected => {
                self.transition(SessionState::Aborted);
                info!(connection_id = %connection, tokens = self.emitted, "generation aborted, connection closed");
                SessionOutcome::Aborted
            }
        }
    }

    /// Sleep unless cancelled first; returns `false` on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.ticket.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    fn emit(&self, event: OutboundEvent) -> bool {
        self.registry.send(self.connection(), event)
    }

    fn transition(&mut self, next: SessionState) {
        debug!(connection_id = %self.connection(), from = ?self.state, state = ?next, "session transition");
        self.state = next;
    }
}
