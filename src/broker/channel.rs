//! Client and channel tables
//!
//! `ClientRegistry` answers "is this id connected". `ChannelTable` keeps the
//! two subscription views consistent:
//! - channel → member records (used for dispatch)
//! - client → subscribed channels (used for lifecycle events and snapshots)
//!
//! Both tables preserve insertion order so snapshots and fan-out are
//! deterministic. Channels are never removed once created.

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::client::{ChannelDescriptor, ClientId, ClientRecord, ClientTransport, SubscriptionEntry};

#[derive(Debug, Default)]
pub struct ClientRegistry {
    connected: IndexSet<ClientId>,
}

impl ClientRegistry {
    /// Returns `false` if the id was already connected.
    pub fn connect(&mut self, client_id: &str) -> bool {
        self.connected.insert(client_id.to_string())
    }

    /// Returns `false` if the id was not connected.
    pub fn disconnect(&mut self, client_id: &str) -> bool {
        self.connected.shift_remove(client_id)
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.connected.contains(client_id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.connected.iter().cloned().collect()
    }
}

/// Per-client subscription state. `transport` is the one supplied with the
/// client's first subscribe call and is used to reach it for lifecycle events.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub channels: Vec<ChannelDescriptor>,
    pub transport: ClientTransport,
}

#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: IndexMap<String, Vec<ClientRecord>>,
    subscribers: IndexMap<ClientId, Subscriber>,
}

impl ChannelTable {
    /// Add `client_id` to every channel in `channels`, creating channels as
    /// needed, and merge them into the client's own channel list.
    ///
    /// Returns `true` if this was the client's first subscription.
    pub fn upsert(
        &mut self,
        client_id: &str,
        channels: &[ChannelDescriptor],
        transport: &ClientTransport,
    ) -> bool {
        for channel in channels {
            let members = self.channels.entry(channel.channel_id.clone()).or_default();
            if !members.iter().any(|r| r.client_id == client_id) {
                members.push(ClientRecord {
                    client_id: client_id.to_string(),
                    subscribed_channels: channels.to_vec(),
                    transport: transport.clone(),
                });
                debug!("Added {client_id} to channel {}", channel.channel_id);
            }
            if let Some(subscriber) = self.subscribers.get_mut(client_id) {
                if !subscriber.channels.contains(channel) {
                    subscriber.channels.push(channel.clone());
                }
            }
        }

        if self.subscribers.contains_key(client_id) {
            return false;
        }
        self.subscribers.insert(
            client_id.to_string(),
            Subscriber {
                channels: channels.to_vec(),
                transport: transport.clone(),
            },
        );
        true
    }

    /// Remove `client_id` from one channel.
    ///
    /// Returns `false` if the channel does not exist.
    pub fn remove_from_channel(&mut self, channel_id: &str, client_id: &str) -> bool {
        let Some(members) = self.channels.get_mut(channel_id) else {
            return false;
        };
        members.retain(|r| r.client_id != client_id);
        if let Some(subscriber) = self.subscribers.get_mut(client_id) {
            subscriber.channels.retain(|c| c.channel_id != channel_id);
        }
        true
    }

    /// Remove every record of `client_id` from every channel and drop its
    /// subscription state.
    pub fn remove_client(&mut self, client_id: &str) -> Option<Subscriber> {
        for (channel_id, members) in self.channels.iter_mut() {
            let before = members.len();
            members.retain(|r| r.client_id != client_id);
            if members.len() != before {
                debug!("Removed {client_id} from channel {channel_id}");
            }
        }
        self.subscribers.shift_remove(client_id)
    }

    pub fn members(&self, channel_id: &str) -> Option<&[ClientRecord]> {
        self.channels.get(channel_id).map(Vec::as_slice)
    }

    pub fn subscriber(&self, client_id: &str) -> Option<&Subscriber> {
        self.subscribers.get(client_id)
    }

    pub fn subscribers(&self) -> impl Iterator<Item = (&ClientId, &Subscriber)> {
        self.subscribers.iter()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Copy of every client's subscription entry, in subscription order.
    pub fn snapshot(&self) -> Vec<SubscriptionEntry> {
        self.subscribers
            .iter()
            .map(|(client_id, subscriber)| SubscriptionEntry {
                client_id: client_id.clone(),
                channels: subscriber.channels.clone(),
            })
            .collect()
    }

    /// Entries of every subscribed client except `client_id`.
    pub fn snapshot_excluding(&self, client_id: &str) -> Vec<SubscriptionEntry> {
        self.snapshot()
            .into_iter()
            .filter(|entry| entry.client_id != client_id)
            .collect()
    }
}
