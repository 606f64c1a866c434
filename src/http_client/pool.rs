//! A thread-safe pool of HTTP clients keyed by retry policy.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;
use tokio::sync::RwLock;

use super::client::create_retryable_http_client;
use crate::config::HttpRetryConfig;

const MAX_IDLE_PER_HOST: usize = 10;
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// Pool of HTTP clients, one per distinct `HttpRetryConfig`.
///
/// Each client owns its own connection pool; dropping the pool (or calling
/// [`HttpClientPool::clear`]) releases every idle connection.
pub struct HttpClientPool {
    clients: RwLock<HashMap<HttpRetryConfig, Arc<ClientWithMiddleware>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool`.
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()) }
    }

    /// Gets the client for `retry_policy`, creating it on first use.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        if let Some(client) = self.clients.read().await.get(retry_policy) {
            return Ok(client.clone());
        }

        let mut clients = self.clients.write().await;
        // Another task may have created it while we waited for the write lock.
        if let Some(client) = clients.get(retry_policy) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(IDLE_TIMEOUT))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(retry_policy.clone(), new_client.clone());

        Ok(new_client)
    }

    /// Drops every pooled client. Clients still held elsewhere stay usable
    /// until their last reference is dropped.
    pub async fn clear(&self) {
        self.clients.write().await.clear();
    }

    /// Returns the number of active HTTP clients in the pool.
    pub async fn active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_init_empty() {
        let pool = HttpClientPool::new();
        assert_eq!(pool.active_client_count().await, 0);
    }

    #[tokio::test]
    async fn test_pool_returns_same_client() {
        let pool = HttpClientPool::new();
        let retry_config = HttpRetryConfig::default();
        let client1 = pool.get_or_create(&retry_config).await.unwrap();
        let client2 = pool.get_or_create(&retry_config).await.unwrap();

        assert!(Arc::ptr_eq(&client1, &client2), "Should return the same client instance");
        assert_eq!(pool.active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_returns_different_clients_for_different_configs() {
        let pool = HttpClientPool::new();
        let default_config = HttpRetryConfig::default();
        let eager_config = HttpRetryConfig { max_retries: 5, ..Default::default() };

        let client1 = pool.get_or_create(&default_config).await.unwrap();
        let client2 = pool.get_or_create(&eager_config).await.unwrap();

        assert!(!Arc::ptr_eq(&client1, &client2));
        assert_eq!(pool.active_client_count().await, 2);
    }

    #[tokio::test]
    async fn test_pool_concurrent_access() {
        let pool = Arc::new(HttpClientPool::new());
        let retry_config = HttpRetryConfig::default();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let pool = Arc::clone(&pool);
            let retry_config = retry_config.clone();
            tasks.spawn(async move { pool.get_or_create(&retry_config).await.is_ok() });
        }

        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap(), "Should successfully create or get HTTP client");
        }
        assert_eq!(pool.active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_clear() {
        let pool = HttpClientPool::new();
        let client = pool.get_or_create(&HttpRetryConfig::default()).await.unwrap();
        pool.clear().await;
        assert_eq!(pool.active_client_count().await, 0);
        // The handed-out client is still owned by the caller.
        assert_eq!(Arc::strong_count(&client), 1);
    }
}
