//! Streaming session protocol
//!
//! [`Gateway`] is the entry point; everything else is keyed by [`ConnectionId`]
//! in the [`SessionRegistry`].

pub mod gateway;
pub mod heartbeat;
pub mod recency;
pub mod registry;
pub mod session;

pub use gateway::Gateway;
pub use heartbeat::{Heartbeat, HeartbeatExit};
pub use recency::RecencySet;
pub use registry::{ConnectionId, SessionRegistry};
pub use session::{SessionOutcome, SessionSettings, SessionState, StreamingSession};
