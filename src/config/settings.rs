use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Address the WebSocket bridge binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Settings of the broker engine.
///
/// `service_name` stamps every outbound envelope; `broker_channel_id` is the
/// `channelId` of lifecycle event envelopes; `accepted_origins` seeds the
/// origin registry.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub service_name: String,
    pub broker_channel_id: String,
    pub accepted_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub service_name: Option<String>,
    pub broker_channel_id: Option<String>,
    pub accepted_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            service_name: "sap.ushell.services.MessageBroker".to_string(),
            broker_channel_id: "sap-ushell-services-MessageBroker".to_string(),
            accepted_origins: vec!["http://127.0.0.1:8080".to_string()],
        }
    }
}

impl PartialSettings {
    /// Overlay the values present in `self` onto `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(defaults.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(defaults.server.port),
            },
            broker: BrokerSettings {
                service_name: broker
                    .as_ref()
                    .and_then(|b| b.service_name.clone())
                    .unwrap_or(defaults.broker.service_name),
                broker_channel_id: broker
                    .as_ref()
                    .and_then(|b| b.broker_channel_id.clone())
                    .unwrap_or(defaults.broker.broker_channel_id),
                accepted_origins: broker
                    .as_ref()
                    .and_then(|b| b.accepted_origins.clone())
                    .unwrap_or(defaults.broker.accepted_origins),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(defaults.log.level),
            },
        }
    }
}
