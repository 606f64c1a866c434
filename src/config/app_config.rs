use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{ReminderConfig, ServerConfig, deserialize_duration_from_seconds};
use crate::models::{NotificationMessage, notifier::NotifierConfig};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for event_channel_capacity.
fn default_event_channel_capacity() -> u32 {
    1024
}

/// Application configuration for homewatch.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Database URL for the SQLite state store.
    pub database_url: String,

    /// Address every alert notification is delivered to.
    pub recipient_address: String,

    /// Reminder cadence and scheduling mode.
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Subject and body templates for alert notifications.
    #[serde(default)]
    pub message: NotificationMessage,

    /// The delivery channel for notifications.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// The capacity of the channel carrying flag changes to the engine.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: u32,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// HTTP change source configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading `app.yaml` from the configuration
    /// directory, with `HOMEWATCH__*` environment variables taking precedence.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let app_file = Path::new(config_dir_str).join("app.yaml");
        let s = Config::builder()
            .add_source(File::from(app_file))
            .add_source(Environment::with_prefix("HOMEWATCH").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn recipient_address(mut self, address: &str) -> Self {
        self.config.recipient_address = address.to_string();
        self
    }

    pub fn reminder_interval(mut self, interval: Duration) -> Self {
        self.config.reminders.interval = interval;
        self
    }

    pub fn notifier(mut self, notifier: NotifierConfig) -> Self {
        self.config.notifier = notifier;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}
