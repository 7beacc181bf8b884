//! Request router
//!
//! Entry point for messages arriving from foreign frames. An inbound request
//! envelope is mapped onto one engine operation by its `messageName`:
//! `connect`, `disconnect`, `subscribe` and `unsubscribe` call the matching
//! operation and are acknowledged with a response envelope; any other name is
//! a publish and is never acknowledged. A failed operation sends nothing back.

use serde_json::Value;
use tracing::debug;

use crate::broker::engine::MessageBrokerEngine;
use crate::broker::envelope::Envelope;
use crate::client::{ClientTransport, FrameHandle, SubscriptionEntry};
use crate::utils::{BrokerError, Result};

pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";
pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// A raw message handed over by the transport: the decoded envelope plus
/// where it came from.
#[derive(Debug, Clone)]
pub struct PostMessage {
    pub envelope: Envelope,
    pub origin: String,
    pub source: Option<FrameHandle>,
}

impl MessageBrokerEngine {
    pub fn process_post_message(&mut self, message: PostMessage) -> Result<()> {
        let Some(source) = message.source else {
            return Err(BrokerError::MissingIframeHandle);
        };
        self.handle_post_message_request(&message.envelope, &source, &message.origin)
    }

    pub fn handle_post_message_request(
        &mut self,
        envelope: &Envelope,
        frame: &FrameHandle,
        origin: &str,
    ) -> Result<()> {
        let body = &envelope.body;
        let channels = body.subscribed_channels.as_deref().unwrap_or_default();
        debug!(
            "Routing {} from {} via frame {frame}",
            body.message_name, body.client_id
        );

        let active_clients: Option<Vec<SubscriptionEntry>> = match body.message_name.as_str() {
            CONNECT => Some(self.connect(&body.client_id)?),
            DISCONNECT => {
                self.disconnect(&body.client_id)?;
                None
            }
            SUBSCRIBE => self.subscribe(
                &body.client_id,
                channels,
                Some(ClientTransport::iframe(frame.clone(), origin)),
            )?,
            UNSUBSCRIBE => {
                self.unsubscribe(&body.client_id, channels)?;
                None
            }
            _ => {
                return self.publish(
                    &body.channel_id,
                    &body.client_id,
                    body.request_id.as_deref().unwrap_or_default(),
                    &body.message_name,
                    body.target_client_ids.as_deref().unwrap_or_default(),
                    body.data.as_ref().unwrap_or(&Value::Null),
                );
            }
        };

        let response = self.envelopes().response(
            &envelope.request_id,
            &body.channel_id,
            &body.client_id,
            body.request_id.clone(),
            &body.message_name,
            active_clients,
        );
        self.send(&response, &body.client_id, frame, origin);
        Ok(())
    }
}
