use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type ClientId = String;

/// Invoked for every message published to a same-process client with
/// `(from_client_id, channel_id, message_name, data)`.
pub type MessageCallback = Arc<dyn Fn(&str, &str, &str, &Value) + Send + Sync>;

/// Invoked for lifecycle events with `(message_name, client_id, channels)`.
pub type ConnectionCallback = Arc<dyn Fn(&str, &str, &[ChannelDescriptor]) + Send + Sync>;

/// An opaque channel name. Channels come into existence on first subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    #[serde(rename = "channelId")]
    pub channel_id: String,
}

impl ChannelDescriptor {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
        }
    }
}

/// The channels a connected client is currently subscribed to.
///
/// Handed out by value: a snapshot never aliases broker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEntry {
    pub client_id: ClientId,
    pub channels: Vec<ChannelDescriptor>,
}

/// Identifies one foreign frame (one transport connection). The broker never
/// looks inside; only the transport knows how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(String);

impl FrameHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh handle backed by a UUID v4.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the broker reaches a client.
#[derive(Clone)]
pub enum ClientTransport {
    /// A peer living in the same process; delivery is a direct call.
    SameProcess {
        message_callback: MessageCallback,
        connection_callback: ConnectionCallback,
    },
    /// A foreign frame; delivery goes through the outbound transport.
    Iframe { handle: FrameHandle, origin: String },
}

impl ClientTransport {
    pub fn same_process<M, C>(message_callback: M, connection_callback: C) -> Self
    where
        M: Fn(&str, &str, &str, &Value) + Send + Sync + 'static,
        C: Fn(&str, &str, &[ChannelDescriptor]) + Send + Sync + 'static,
    {
        Self::SameProcess {
            message_callback: Arc::new(message_callback),
            connection_callback: Arc::new(connection_callback),
        }
    }

    pub fn iframe(handle: FrameHandle, origin: impl Into<String>) -> Self {
        Self::Iframe {
            handle,
            origin: origin.into(),
        }
    }

    pub fn is_same_process(&self) -> bool {
        matches!(self, Self::SameProcess { .. })
    }
}

impl fmt::Debug for ClientTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameProcess { .. } => f.debug_struct("SameProcess").finish_non_exhaustive(),
            Self::Iframe { handle, origin } => f
                .debug_struct("Iframe")
                .field("handle", handle)
                .field("origin", origin)
                .finish(),
        }
    }
}

/// One entry of a channel's member list.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: ClientId,
    /// The channel list passed to the subscribe call that created this record.
    pub subscribed_channels: Vec<ChannelDescriptor>,
    pub transport: ClientTransport,
}
