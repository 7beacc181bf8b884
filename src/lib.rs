//! # framebus
//!
//! `framebus` is an in-memory publish/subscribe broker for clients living in
//! different execution contexts: same-process peers reached through
//! callbacks, and foreign frames reached through an asynchronous
//! post-message style transport.
//!
//! ## Core Modules
//!
//! - `broker`: the `MessageBrokerEngine` with its origin, client and channel
//!   tables, the envelope builder and the request router.
//! - `client`: how a participant is identified and reached.
//! - `config`: loading settings from files and environment variables.
//! - `transport`: the outbound `PostMessageTransport` seam and the WebSocket
//!   bridge.
//! - `utils`: the error taxonomy and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use broker::{MessageBrokerEngine, PostMessage};
pub use client::{ChannelDescriptor, ClientTransport, FrameHandle, SubscriptionEntry};
pub use utils::{BrokerError, Result};
