//! Relay-level errors

use thiserror::Error;

use crate::relay::ConnectionId;

/// Errors surfaced by the transport gateway.
///
/// Generation failures never appear here: a session turns them into an
/// outbound `error` event instead.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed or unusable inbound payload; rejected before any session opens
    #[error("protocol misuse: {0}")]
    Protocol(String),

    /// The connection is not (or no longer) registered
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = RelayError::Protocol("conversation has no messages".to_string());
        assert_eq!(err.to_string(), "protocol misuse: conversation has no messages");
    }
}
