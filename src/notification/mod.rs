//! # Notification
//!
//! Outbound delivery of alert notifications.
//!
//! - [`Notifier`] is the delivery capability the alert engine is handed at
//!   construction. It reports success or failure and never retries on the
//!   engine's behalf; the webhook implementation retries transient HTTP
//!   failures inside its own client.
//! - [`MessageComposer`] renders the subject and body from minijinja
//!   templates, filling in the owner's contact profile.
//! - [`create_notifier`] builds the configured implementation.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    http_client::HttpClientPool,
    models::notifier::{NotifierConfig, NotifierConfigError},
};

mod composer;
pub mod error;
mod stdout;
pub mod template;
mod webhook;

pub use composer::{BLANK_PLACEHOLDER, MessageComposer};
pub use error::NotificationError;
pub use stdout::StdoutNotifier;
pub use webhook::WebhookNotifier;

/// A channel that can deliver a rendered notification.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempts a single delivery of `subject` and `body` to
    /// `recipient_address`.
    async fn send(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;

    /// Releases any resources held by the notifier.
    async fn shutdown(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

impl From<NotifierConfigError> for NotificationError {
    fn from(e: NotifierConfigError) -> Self {
        NotificationError::ConfigError(e.to_string())
    }
}

/// Validates `config` and builds the notifier it describes. Webhook notifiers
/// draw their HTTP client from `pool`.
pub async fn create_notifier(
    config: &NotifierConfig,
    pool: &HttpClientPool,
) -> Result<Arc<dyn Notifier>, NotificationError> {
    config.validate()?;
    match config {
        NotifierConfig::Webhook(webhook) => {
            let client = pool.get_or_create(&webhook.retry_policy).await?;
            tracing::info!(url = %webhook.url, "Using webhook notifier.");
            Ok(Arc::new(WebhookNotifier::new(webhook, client)?))
        }
        NotifierConfig::Stdout(_) => {
            tracing::info!("Using stdout notifier.");
            Ok(Arc::new(StdoutNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::{
        config::HttpRetryConfig,
        models::notifier::{StdoutConfig, WebhookConfig},
    };

    #[tokio::test]
    async fn test_create_stdout_notifier() {
        let pool = HttpClientPool::new();
        let notifier = create_notifier(&NotifierConfig::Stdout(StdoutConfig::default()), &pool)
            .await
            .unwrap();
        assert!(notifier.send("ops@example.com", "s", "b").await.is_ok());
        assert_eq!(pool.active_client_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_webhook_notifier_uses_pool() {
        let pool = HttpClientPool::new();
        let config = NotifierConfig::Webhook(WebhookConfig {
            url: Url::parse("https://example.com/alerts").unwrap(),
            method: None,
            secret: None,
            headers: None,
            retry_policy: HttpRetryConfig::default(),
        });
        assert!(create_notifier(&config, &pool).await.is_ok());
        assert_eq!(pool.active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_notifier_rejects_invalid_config() {
        let pool = HttpClientPool::new();
        let config = NotifierConfig::Webhook(WebhookConfig {
            url: Url::parse("ftp://example.com/alerts").unwrap(),
            method: None,
            secret: None,
            headers: None,
            retry_policy: HttpRetryConfig::default(),
        });
        let result = create_notifier(&config, &pool).await;
        assert!(matches!(result, Err(NotificationError::ConfigError(_))));
    }
}
