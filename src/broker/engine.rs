//! Broker engine
//!
//! `MessageBrokerEngine` owns every table of the broker and implements the
//! five client operations: connect, disconnect, subscribe, unsubscribe and
//! publish.
//!
//! Concurrency and usage notes:
//! - The API is synchronous. Table mutation finishes inside the call that
//!   caused it, and lifecycle events are delivered before that call returns.
//! - Transports that serve many connections hold the engine behind a lock
//!   (for example `Arc<Mutex<MessageBrokerEngine>>`).
//! - Same-process callbacks run while the caller holds `&mut` access to the
//!   engine and must not call back into it.
//! - Frame delivery is fire-and-forget: the transport enqueues, and send
//!   failures are logged, never returned to the publisher.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::broker::channel::{ChannelTable, ClientRegistry};
use crate::broker::envelope::{Envelope, EnvelopeBuilder};
use crate::broker::origin::OriginRegistry;
use crate::client::{
    ChannelDescriptor, ClientId, ClientRecord, ClientTransport, FrameHandle, SubscriptionEntry,
};
use crate::config::BrokerSettings;
use crate::transport::PostMessageTransport;
use crate::utils::{BrokerError, Result};

/// Lifecycle message sent to peers when a client subscribes.
pub const CLIENT_SUBSCRIBED: &str = "clientSubscribed";
/// Lifecycle message sent to peers when a client unsubscribes or disconnects.
pub const CLIENT_UNSUBSCRIBED: &str = "clientUnsubscribed";
/// Target id meaning "every current member of the channel".
pub const WILDCARD_TARGET: &str = "*";

pub struct MessageBrokerEngine {
    origins: OriginRegistry,
    clients: ClientRegistry,
    channels: ChannelTable,
    envelopes: EnvelopeBuilder,
    broker_channel_id: String,
    transport: Arc<dyn PostMessageTransport>,
}

impl MessageBrokerEngine {
    pub fn new(settings: &BrokerSettings, transport: Arc<dyn PostMessageTransport>) -> Self {
        Self {
            origins: OriginRegistry::with_origins(&settings.accepted_origins),
            clients: ClientRegistry::default(),
            channels: ChannelTable::default(),
            envelopes: EnvelopeBuilder::new(settings.service_name.clone()),
            broker_channel_id: settings.broker_channel_id.clone(),
            transport,
        }
    }

    pub fn add_accepted_origin(&mut self, origin: &str) {
        self.origins.add_accepted_origin(origin);
    }

    pub fn remove_accepted_origin(&mut self, origin: &str) {
        self.origins.remove_accepted_origin(origin);
    }

    pub fn accepted_origins(&self) -> Vec<String> {
        self.origins.accepted_origins()
    }

    pub fn origins(&self) -> &OriginRegistry {
        &self.origins
    }

    pub fn envelopes(&self) -> &EnvelopeBuilder {
        &self.envelopes
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.clients.is_connected(client_id)
    }

    pub fn connected_clients(&self) -> Vec<ClientId> {
        self.clients.ids()
    }

    /// Snapshot of every subscribed client's channels.
    pub fn subscribed_clients(&self) -> Vec<SubscriptionEntry> {
        self.channels.snapshot()
    }

    /// Ids of the members of `channel_id`, or `None` if the channel was
    /// never created.
    pub fn channel_members(&self, channel_id: &str) -> Option<Vec<ClientId>> {
        self.channels
            .members(channel_id)
            .map(|members| members.iter().map(|r| r.client_id.clone()).collect())
    }

    pub fn client_channels(&self, client_id: &str) -> Option<Vec<ChannelDescriptor>> {
        self.channels
            .subscriber(client_id)
            .map(|subscriber| subscriber.channels.clone())
    }

    /// Register `client_id` as connected and return the subscription
    /// landscape it joins.
    pub fn connect(&mut self, client_id: &str) -> Result<Vec<SubscriptionEntry>> {
        if client_id.is_empty() {
            return Err(BrokerError::ClientIdInvalid);
        }
        if !self.clients.connect(client_id) {
            return Err(BrokerError::AlreadyConnected {
                client_id: client_id.to_string(),
            });
        }
        info!("Client {client_id} connected");
        Ok(self.channels.snapshot())
    }

    pub fn disconnect(&mut self, client_id: &str) -> Result<()> {
        if client_id.is_empty() {
            return Err(BrokerError::ClientIdInvalid);
        }
        if !self.clients.is_connected(client_id) {
            return Err(BrokerError::AlreadyDisconnected {
                client_id: client_id.to_string(),
            });
        }

        if let Some(subscriber) = self.channels.remove_client(client_id) {
            if !subscriber.channels.is_empty() {
                self.emit_event(CLIENT_UNSUBSCRIBED, client_id, &subscriber.channels);
            }
        }
        self.clients.disconnect(client_id);
        info!("Client {client_id} disconnected");
        Ok(())
    }

    /// Subscribe `client_id` to `channels`, merging with any earlier
    /// subscription.
    ///
    /// Returns the other subscribers' entries when a frame client subscribes
    /// for the first time, `None` otherwise.
    pub fn subscribe(
        &mut self,
        client_id: &str,
        channels: &[ChannelDescriptor],
        transport: Option<ClientTransport>,
    ) -> Result<Option<Vec<SubscriptionEntry>>> {
        let Some(transport) = transport else {
            return Err(BrokerError::MissingParameters {
                operation: "subscribe",
            });
        };
        if client_id.is_empty() || channels.is_empty() {
            return Err(BrokerError::MissingParameters {
                operation: "subscribe",
            });
        }
        if !self.clients.is_connected(client_id) {
            return Err(BrokerError::ClientNotConnected {
                client_id: client_id.to_string(),
            });
        }

        let first_time = self.channels.upsert(client_id, channels, &transport);
        debug!(
            "Client {client_id} subscribed to {} channel(s), first_time={first_time}",
            channels.len()
        );

        let mut active_clients = None;
        if first_time {
            let others = self.channels.snapshot_excluding(client_id);
            match &transport {
                ClientTransport::SameProcess {
                    connection_callback,
                    ..
                } => {
                    for entry in &others {
                        connection_callback(CLIENT_SUBSCRIBED, &entry.client_id, &entry.channels);
                    }
                }
                ClientTransport::Iframe { .. } => active_clients = Some(others),
            }
        }

        if self.channels.subscriber_count() > 1 {
            self.emit_event(CLIENT_SUBSCRIBED, client_id, channels);
        }

        Ok(active_clients)
    }

    /// Leave `channels`. Unknown channels are skipped with a warning; peers
    /// are always told about the full requested list.
    pub fn unsubscribe(&mut self, client_id: &str, channels: &[ChannelDescriptor]) -> Result<()> {
        if client_id.is_empty() || channels.is_empty() {
            return Err(BrokerError::MissingParameters {
                operation: "unsubscribe",
            });
        }
        if !self.clients.is_connected(client_id) {
            return Err(BrokerError::ClientNotConnected {
                client_id: client_id.to_string(),
            });
        }

        for channel in channels {
            if self
                .channels
                .remove_from_channel(&channel.channel_id, client_id)
            {
                debug!("Client {client_id} left channel {}", channel.channel_id);
            } else {
                warn!(
                    "Client {client_id} unsubscribed from unknown channel {}",
                    channel.channel_id
                );
            }
        }

        self.emit_event(CLIENT_UNSUBSCRIBED, client_id, channels);
        Ok(())
    }

    /// Deliver `data` to the resolved targets on `channel_id`.
    ///
    /// `"*"` in `target_client_ids` selects every member of the channel and
    /// ends resolution. Ids without a matching member are dropped. The
    /// sender never receives its own message.
    pub fn publish(
        &self,
        channel_id: &str,
        from_client_id: &str,
        message_id: &str,
        message_name: &str,
        target_client_ids: &[String],
        data: &Value,
    ) -> Result<()> {
        if !self.clients.is_connected(from_client_id) {
            return Err(BrokerError::ClientNotConnected {
                client_id: from_client_id.to_string(),
            });
        }
        let Some(members) = self.channels.members(channel_id) else {
            return Err(BrokerError::UnknownChannel {
                channel_id: channel_id.to_string(),
            });
        };
        if !members.iter().any(|r| r.client_id == from_client_id) {
            return Err(BrokerError::NotSubscribedToChannel {
                client_id: from_client_id.to_string(),
                channel_id: channel_id.to_string(),
            });
        }

        let targets = resolve_targets(members, target_client_ids);
        if targets.is_empty() {
            return Err(BrokerError::NoTargetClientsFound {
                channel_id: channel_id.to_string(),
            });
        }

        debug!(
            "Client {from_client_id} published {message_name} ({message_id}) to {channel_id}"
        );
        for target in targets
            .into_iter()
            .filter(|r| r.client_id != from_client_id)
        {
            match &target.transport {
                ClientTransport::SameProcess {
                    message_callback, ..
                } => message_callback(from_client_id, channel_id, message_name, data),
                ClientTransport::Iframe { handle, origin } => {
                    let envelope = self.envelopes.request(
                        channel_id,
                        from_client_id,
                        message_name,
                        Some(data.clone()),
                        None,
                    );
                    self.send(&envelope, &target.client_id, handle, origin);
                }
            }
        }
        Ok(())
    }

    /// Notify every subscribed client other than `client_id`.
    fn emit_event(&self, message_name: &str, client_id: &str, channels: &[ChannelDescriptor]) {
        for (peer_id, subscriber) in self.channels.subscribers() {
            if peer_id == client_id {
                continue;
            }
            match &subscriber.transport {
                ClientTransport::SameProcess {
                    connection_callback,
                    ..
                } => connection_callback(message_name, client_id, channels),
                ClientTransport::Iframe { handle, origin } => {
                    let envelope = self.envelopes.event(
                        &self.broker_channel_id,
                        client_id,
                        message_name,
                        channels.to_vec(),
                    );
                    self.send(&envelope, peer_id, handle, origin);
                }
            }
        }
    }

    pub(crate) fn send(
        &self,
        envelope: &Envelope,
        client_id: &str,
        handle: &FrameHandle,
        origin: &str,
    ) {
        if let Err(e) = self
            .transport
            .send_to_client(envelope, handle, origin, false)
        {
            error!("Failed to send to {client_id} via frame {handle}: {e}");
        }
    }
}

fn resolve_targets<'a>(
    members: &'a [ClientRecord],
    target_client_ids: &[String],
) -> Vec<&'a ClientRecord> {
    let mut targets: Vec<&ClientRecord> = Vec::new();
    for id in target_client_ids {
        if id == WILDCARD_TARGET {
            return members.iter().collect();
        }
        if let Some(record) = members.iter().find(|r| &r.client_id == id) {
            if !targets.iter().any(|t| t.client_id == record.client_id) {
                targets.push(record);
            }
        }
    }
    targets
}
