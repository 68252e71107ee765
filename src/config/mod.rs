mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{BrokerSettings, ClientSettings, LogSettings, ServerSettings, Settings};

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Environment keys use the `UDPSUB` prefix and `__` between sections,
/// e.g. `UDPSUB_BROKER__BUFFER_CAPACITY=64`
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("UDPSUB")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            buffer_capacity: partial
                .broker
                .as_ref()
                .and_then(|b| b.buffer_capacity)
                .unwrap_or(default.broker.buffer_capacity),
            dispatch_interval_ms: partial
                .broker
                .as_ref()
                .and_then(|b| b.dispatch_interval_ms)
                .unwrap_or(default.broker.dispatch_interval_ms),
        },
        client: ClientSettings {
            topic: partial
                .client
                .as_ref()
                .and_then(|c| c.topic.clone())
                .unwrap_or(default.client.topic),
        },
        log: LogSettings {
            level: partial
                .log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    })
}
