mod settings;

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{
    BrokerBackend, BrokerSettings, LogSettings, RelaySettings, ServerSettings, Settings,
    StoreBackend, StoreSettings,
};

/// Environment variables look like `MSGRELAY__RELAY__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "MSGRELAY";

/// Loads `.env.local` into the process environment if it exists.
///
/// Returns the path that was loaded, or the reason nothing was.
pub fn load_dotenv() -> Result<std::path::PathBuf, dotenvy::Error> {
    dotenvy::from_filename(".env.local")
}

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a validated `Settings`
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("broker.addresses")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge(Settings::default());
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_content_length == 0 {
            return Err(ConfigError::Message(
                "store.max_content_length must be at least 1".to_string(),
            ));
        }
        if self.broker.channel_name.trim().is_empty() {
            return Err(ConfigError::Message(
                "broker.channel_name must not be empty".to_string(),
            ));
        }
        if self.broker.addresses.iter().all(|a| a.trim().is_empty()) {
            return Err(ConfigError::Message(
                "broker.addresses must name at least one broker".to_string(),
            ));
        }
        Ok(())
    }
}

impl RelaySettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
