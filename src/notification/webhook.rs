//! Webhook notifier.
//!
//! Posts each alert as a JSON document `{recipient, subject, body}` through a
//! retrying HTTP client, optionally signing it with HMAC-SHA256.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
    Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use sha2::Sha256;
use url::Url;

use super::{Notifier, error::NotificationError};
use crate::models::notifier::WebhookConfig;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Delivers notifications to an HTTP endpoint.
pub struct WebhookNotifier {
    url: Url,
    client: Arc<ClientWithMiddleware>,
    method: Method,
    secret: Option<String>,
    headers: HashMap<String, String>,
}

impl WebhookNotifier {
    /// Creates a new webhook notifier from its configuration and a pooled
    /// HTTP client.
    pub fn new(
        config: &WebhookConfig,
        http_client: Arc<ClientWithMiddleware>,
    ) -> Result<Self, NotificationError> {
        let method = match config.method.as_deref() {
            Some(m) => Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|e| {
                NotificationError::ConfigError(format!("Invalid HTTP method {m}: {e}"))
            })?,
            None => Method::POST,
        };

        Ok(Self {
            url: config.url.clone(),
            client: http_client,
            method,
            secret: config.secret.clone(),
            headers: config.headers.clone().unwrap_or_default(),
        })
    }

    /// Signs `payload` with `secret`, returning the hex signature and the
    /// millisecond timestamp that was mixed into it.
    pub fn sign_payload(
        &self,
        secret: &str,
        payload: &serde_json::Value,
    ) -> Result<(String, String), NotificationError> {
        // `new_from_slice` accepts empty keys.
        if secret.is_empty() {
            return Err(NotificationError::NotifyFailed(
                "Invalid secret: cannot be empty.".to_string(),
            ));
        }

        let timestamp = Utc::now().timestamp_millis();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::ConfigError(format!("Invalid secret: {e}")))?;

        let serialized_payload = serde_json::to_string(payload).map_err(|e| {
            NotificationError::InternalError(format!("Failed to serialize payload: {e}"))
        })?;
        mac.update(format!("{serialized_payload}{timestamp}").as_bytes());

        let signature = hex::encode(mac.finalize().into_bytes());

        Ok((signature, timestamp.to_string()))
    }

    fn build_headers(&self, payload: &serde_json::Value) -> Result<HeaderMap, NotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );

        if let Some(secret) = &self.secret {
            let (signature, timestamp) = self.sign_payload(secret, payload)?;
            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                NotificationError::NotifyFailed(format!("Invalid header name: {key}: {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                NotificationError::NotifyFailed(format!(
                    "Invalid header value for {key}: {value}: {e}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let payload = json!({
            "recipient": recipient_address,
            "subject": subject,
            "body": body,
        });
        let headers = self.build_headers(&payload)?;

        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(headers)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::NotifyFailed(format!(
                "Webhook request failed with status: {status}"
            )));
        }

        tracing::debug!(url = %self.url, %status, "Webhook notification delivered.");
        Ok(())
    }
}
