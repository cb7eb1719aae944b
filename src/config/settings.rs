use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub relay: RelaySettings,
    pub store: StoreSettings,
    pub log: LogSettings,
}

/// Address the HTTP boundary binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    Memory,
    Kafka,
}

/// Broker connection and channel.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub backend: BrokerBackend,
    pub addresses: Vec<String>,
    pub channel_name: String,
    pub group_id: String,
}

/// Bounded-retry policy of the consume loop.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RelaySettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sled,
    Memory,
}

/// Record store location and content limits.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: String,
    pub max_content_length: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub relay: Option<PartialRelaySettings>,
    pub store: Option<PartialStoreSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub backend: Option<BrokerBackend>,
    pub addresses: Option<Vec<String>>,
    pub channel_name: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialRelaySettings {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialStoreSettings {
    pub backend: Option<StoreBackend>,
    pub path: Option<String>,
    pub max_content_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let relay = self.relay.unwrap_or_default();
        let store = self.store.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                backend: broker.backend.unwrap_or(default.broker.backend),
                addresses: broker.addresses.unwrap_or(default.broker.addresses),
                channel_name: broker.channel_name.unwrap_or(default.broker.channel_name),
                group_id: broker.group_id.unwrap_or(default.broker.group_id),
            },
            relay: RelaySettings {
                max_retries: relay.max_retries.unwrap_or(default.relay.max_retries),
                retry_delay_ms: relay.retry_delay_ms.unwrap_or(default.relay.retry_delay_ms),
            },
            store: StoreSettings {
                backend: store.backend.unwrap_or(default.store.backend),
                path: store.path.unwrap_or(default.store.path),
                max_content_length: store
                    .max_content_length
                    .unwrap_or(default.store.max_content_length),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                backend: BrokerBackend::Memory,
                addresses: vec!["localhost:9092".to_string()],
                channel_name: "messages".to_string(),
                group_id: "message-processor-group".to_string(),
            },
            relay: RelaySettings {
                max_retries: 3,
                retry_delay_ms: 5000,
            },
            store: StoreSettings {
                backend: StoreBackend::Sled,
                path: "messages_db".to_string(),
                max_content_length: 1000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
