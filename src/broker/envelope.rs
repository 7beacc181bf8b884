//! Envelope builder
//!
//! Foreign frames exchange JSON envelopes of the form
//! `{type, request_id, service, status?, body}`. Three shapes are produced:
//! - request: a publish pushed to a frame
//! - response: the acknowledgement of an inbound lifecycle request
//! - event: a `clientSubscribed`/`clientUnsubscribed` notification
//!
//! Inbound requests use the same envelope; their body additionally carries
//! `requestId`, `subscribedChannels` and `targetClientIds`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ChannelDescriptor, SubscriptionEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub request_id: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub body: EnvelopeBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeBody {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub message_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_clients: Option<Vec<SubscriptionEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed_channels: Option<Vec<ChannelDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_client_ids: Option<Vec<String>>,
}

/// Builds outbound envelopes stamped with a fixed service name.
#[derive(Debug)]
pub struct EnvelopeBuilder {
    service: String,
    sequence: AtomicU64,
}

impl EnvelopeBuilder {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Time-derived id; the sequence suffix keeps ids distinct within one
    /// millisecond.
    fn next_request_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", Utc::now().timestamp_millis())
    }

    pub fn request(
        &self,
        channel_id: &str,
        client_id: &str,
        message_name: &str,
        data: Option<Value>,
        active_clients: Option<Vec<SubscriptionEntry>>,
    ) -> Envelope {
        Envelope {
            kind: EnvelopeKind::Request,
            request_id: self.next_request_id(),
            service: self.service.clone(),
            status: None,
            body: EnvelopeBody {
                channel_id: channel_id.to_string(),
                client_id: client_id.to_string(),
                message_name: message_name.to_string(),
                data,
                active_clients,
                ..EnvelopeBody::default()
            },
        }
    }

    /// Acknowledgement of a successful inbound request. Failures are never
    /// acknowledged, so the status is always `success`.
    pub fn response(
        &self,
        request_id: &str,
        channel_id: &str,
        client_id: &str,
        correlation_message_id: Option<String>,
        message_name: &str,
        active_clients: Option<Vec<SubscriptionEntry>>,
    ) -> Envelope {
        Envelope {
            kind: EnvelopeKind::Response,
            request_id: request_id.to_string(),
            service: self.service.clone(),
            status: Some(Status::Success),
            body: EnvelopeBody {
                channel_id: channel_id.to_string(),
                client_id: client_id.to_string(),
                message_name: message_name.to_string(),
                correlation_message_id,
                active_clients,
                ..EnvelopeBody::default()
            },
        }
    }

    pub fn event(
        &self,
        channel_id: &str,
        client_id: &str,
        message_name: &str,
        channels: Vec<ChannelDescriptor>,
    ) -> Envelope {
        Envelope {
            kind: EnvelopeKind::Request,
            request_id: self.next_request_id(),
            service: self.service.clone(),
            status: None,
            body: EnvelopeBody {
                channel_id: channel_id.to_string(),
                client_id: client_id.to_string(),
                message_name: message_name.to_string(),
                channels: Some(channels),
                ..EnvelopeBody::default()
            },
        }
    }
}
