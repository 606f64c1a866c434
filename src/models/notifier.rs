//! This module defines the data structures for notifier configurations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::HttpRetryConfig;

/// Configuration for a generic webhook.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// The URL of the webhook endpoint.
    pub url: Url,
    /// The HTTP method to use for the webhook (e.g., "POST", "PUT").
    pub method: Option<String>,
    /// An optional secret for signing webhook requests.
    pub secret: Option<String>,
    /// Optional custom headers to include in the webhook request.
    pub headers: Option<HashMap<String, String>>,
    /// The retry policy configuration for HTTP requests.
    #[serde(default)]
    pub retry_policy: HttpRetryConfig,
}

/// Configuration for the stdout notifier.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct StdoutConfig {}

/// The delivery channel used for outbound notifications.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Deliver as a JSON webhook.
    Webhook(WebhookConfig),
    /// Print to standard output.
    Stdout(StdoutConfig),
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Stdout(StdoutConfig::default())
    }
}

/// Error types for notifier configuration validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifierConfigError {
    /// The webhook URL does not use http or https.
    #[error("Unsupported webhook URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The configured HTTP method is not recognized.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The configured secret is empty.
    #[error("Webhook secret cannot be empty.")]
    EmptySecret,
}

impl NotifierConfig {
    /// Validates the notifier configuration.
    pub fn validate(&self) -> Result<(), NotifierConfigError> {
        match self {
            NotifierConfig::Webhook(config) => {
                if !matches!(config.url.scheme(), "http" | "https") {
                    return Err(NotifierConfigError::UnsupportedScheme(
                        config.url.scheme().to_string(),
                    ));
                }
                if let Some(method) = &config.method
                    && !matches!(method.to_uppercase().as_str(), "POST" | "PUT" | "PATCH")
                {
                    return Err(NotifierConfigError::InvalidMethod(method.clone()));
                }
                if config.secret.as_deref() == Some("") {
                    return Err(NotifierConfigError::EmptySecret);
                }
                Ok(())
            }
            // Standard output notifier requires no validation.
            NotifierConfig::Stdout(_) => Ok(()),
        }
    }
}
