//! The `client` module defines how a participant of the broker is
//! represented.
//!
//! A client is either a same-process peer reached through two callbacks, or
//! a foreign frame reached through the outbound transport. The two shapes
//! are the variants of [`ClientTransport`] and are matched exhaustively at
//! dispatch time.

pub mod record;

pub use record::{
    ChannelDescriptor, ClientId, ClientRecord, ClientTransport, ConnectionCallback, FrameHandle,
    MessageCallback, SubscriptionEntry,
};

#[cfg(test)]
mod tests;
