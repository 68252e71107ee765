use std::time::Duration;

use serde::Deserialize;

use crate::utils::{BrokerError, Result};

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub client: ClientSettings,
    pub log: LogSettings,
}

/// Address the broker binds its UDP socket to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Per-subscriber buffering and dispatch pacing.
///
/// `buffer_capacity` bounds every subscriber's outbound buffer and
/// `dispatch_interval_ms` is the polling interval of the supervisory scan
/// and of each idle dispatch loop.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub buffer_capacity: usize,
    pub dispatch_interval_ms: u64,
}

impl BrokerSettings {
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(BrokerError::InvalidConfig(
                "broker.buffer_capacity must be greater than 0".to_string(),
            ));
        }
        if self.dispatch_interval_ms == 0 {
            return Err(BrokerError::InvalidConfig(
                "broker.dispatch_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Topic a subscriber client registers under. Empty means broadcast only.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub topic: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.broker.validate()
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub client: Option<PartialClientSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub buffer_capacity: Option<usize>,
    pub dispatch_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 1234,
            },
            broker: BrokerSettings::default(),
            client: ClientSettings {
                topic: String::new(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            dispatch_interval_ms: 10,
        }
    }
}
