//! Transport types and error definitions.

use std::fmt;
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection closed before the request completed.
    #[error("Connection closed")]
    Closed,

    /// The node stopped answering heartbeats.
    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    /// The node answered with an error.
    #[error("RPC error: {message}")]
    Rpc {
        message: String,
        code: Option<String>,
    },

    /// The caller's deadline elapsed.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The WebSocket could not be established.
    #[error("Connect error: {0}")]
    Connect(String),

    /// An inbound frame did not follow the wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An outbound value could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Error code attached by the node, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            TransportError::Rpc { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress; requests are queued.
    Connecting,
    /// Frames flow in both directions.
    Open,
    /// Waiting out the reconnect delay.
    Reconnecting,
    /// Closed for good.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
