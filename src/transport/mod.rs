//! The `transport` module connects the broker to foreign frames.
//!
//! [`PostMessageTransport`] is the one outbound operation the engine needs.
//! The `websocket` submodule provides the concrete bridge: every WebSocket
//! connection plays the role of one frame, inbound text frames are request
//! envelopes, and outbound envelopes are written back as JSON text.

pub mod websocket;

use crate::broker::Envelope;
use crate::client::FrameHandle;
use crate::utils::TransportError;

pub use websocket::{WebSocketTransport, start_websocket_server};

/// Delivers an envelope to a foreign frame.
///
/// Implementations must not block: they enqueue and return. The engine always
/// passes `wait_for_response = false`.
pub trait PostMessageTransport: Send + Sync {
    fn send_to_client(
        &self,
        envelope: &Envelope,
        frame: &FrameHandle,
        target_origin: &str,
        wait_for_response: bool,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests;
