//! The `error` module defines the closed set of failures a broker operation
//! can report.
//!
//! Every variant carries the offending identifier so callers and tests can
//! match on it instead of parsing prose. A failed operation never mutates
//! broker state.

use thiserror::Error;

/// Errors returned by [`MessageBrokerEngine`](crate::broker::MessageBrokerEngine)
/// operations and by the request router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("client id must be a non-empty string")]
    ClientIdInvalid,

    #[error("client '{client_id}' is already connected")]
    AlreadyConnected { client_id: String },

    #[error("client '{client_id}' is already disconnected")]
    AlreadyDisconnected { client_id: String },

    #[error("client '{client_id}' is not connected")]
    ClientNotConnected { client_id: String },

    #[error("missing parameters for {operation}")]
    MissingParameters { operation: &'static str },

    #[error("unknown channel '{channel_id}'")]
    UnknownChannel { channel_id: String },

    #[error("client '{client_id}' is not subscribed to channel '{channel_id}'")]
    NotSubscribedToChannel {
        client_id: String,
        channel_id: String,
    },

    #[error("no target clients found on channel '{channel_id}'")]
    NoTargetClientsFound { channel_id: String },

    #[error("post message has no iframe handle")]
    MissingIframeHandle,
}

/// Failures of the outbound `sendToClient` path. The engine logs these and
/// does not propagate them to the publisher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame '{frame}' is closed")]
    Closed { frame: String },

    #[error("target origin '{expected}' does not match frame origin '{actual}'")]
    OriginMismatch { expected: String, actual: String },

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
