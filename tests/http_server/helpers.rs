use std::{net::SocketAddr, sync::Arc};

use homewatch::{
    config::{AppConfig, ServerConfig},
    http_server,
    models::FlagChange,
    persistence::{sqlite::SqliteStateRepository, traits::DeviceStore},
};
use reqwest::Client;
use tokio::{sync::mpsc, task};
use tokio_util::sync::CancellationToken;

pub const TEST_API_KEY: &str = "test-key";

pub async fn create_test_repo() -> Arc<SqliteStateRepository> {
    let repo = SqliteStateRepository::new("sqlite::memory:")
        .await
        .expect("Failed to create in-memory repo");
    repo.run_migrations().await.expect("Failed to run migrations");
    Arc::new(repo)
}

pub fn create_test_server_config(address: &str, api_key: Option<&str>) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        database_url: "sqlite::memory:".to_string(),
        recipient_address: "admin@example.com".to_string(),
        server: ServerConfig {
            listen_address: address.into(),
            api_key: api_key.map(str::to_string),
            ..Default::default()
        },
        ..Default::default()
    })
}

pub struct TestServer {
    pub address: SocketAddr,
    pub server_handle: task::JoinHandle<()>,
    pub client: Client,
    pub events_rx: mpsc::Receiver<FlagChange>,
    shutdown: CancellationToken,
}

impl TestServer {
    pub async fn new(repo: Arc<dyn DeviceStore>) -> Self {
        Self::with_api_key(repo, Some(TEST_API_KEY)).await
    }

    pub async fn with_api_key(repo: Arc<dyn DeviceStore>, api_key: Option<&str>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        drop(listener); // Release port for the app to use

        let config = create_test_server_config(&addr.to_string(), api_key);
        let (events_tx, events_rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();

        let server_shutdown = shutdown.clone();
        let server_handle = task::spawn(async move {
            http_server::run_server_from_config(config, repo, events_tx, server_shutdown)
                .await
                .expect("Server failed");
        });

        // Wait for server to start
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        Self { address: addr, server_handle, client: Client::new(), events_rx, shutdown }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        let url = format!("http://{}{}", self.address, path);
        self.client.get(&url).bearer_auth(TEST_API_KEY).send().await.expect("Request failed")
    }

    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("http://{}{}", self.address, path);
        self.client.put(&url)
    }

    pub async fn put_flag(&self, path: &str, active: bool) -> reqwest::Response {
        self.put(path)
            .bearer_auth(TEST_API_KEY)
            .json(&serde_json::json!({ "active": active }))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn cleanup(self) {
        self.shutdown.cancel();
        let _ = self.server_handle.await;
    }
}
