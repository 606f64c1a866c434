//! HTTP change source.
//!
//! Devices (or a gateway in front of them) write condition flags here; every
//! write is persisted and forwarded to the alert engine as a `FlagChange`.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{config::AppConfig, models::FlagChange, persistence::traits::DeviceStore};

mod auth;
mod conditions;
mod error;

pub use error::ApiError;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Store the flags are written to.
    pub repo: Arc<dyn DeviceStore>,
    /// Channel into the alert engine's event loop.
    pub events_tx: mpsc::Sender<FlagChange>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Builds the router. Condition routes require a bearer token when an API key
/// is configured.
pub fn router(state: ApiState) -> Router {
    let mut conditions = Router::new().route(
        "/devices/{device_id}/conditions/{condition_id}",
        get(conditions::get_condition).put(conditions::put_condition),
    );
    if state.config.server.api_key.is_some() {
        conditions =
            conditions.route_layer(middleware::from_fn_with_state(state.clone(), auth::auth));
    }

    Router::new().route("/health", get(health)).merge(conditions).with_state(state)
}

/// Runs the HTTP server until `shutdown` is cancelled.
pub async fn run_server_from_config(
    config: Arc<AppConfig>,
    repo: Arc<dyn DeviceStore>,
    events_tx: mpsc::Sender<FlagChange>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr: SocketAddr = config.server.listen_address.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid server.listen_address {}: {e}", config.server.listen_address),
        )
    })?;

    let app = router(ApiState { config, repo, events_tx });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
