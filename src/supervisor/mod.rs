//! The Supervisor module manages the lifecycle of the homewatch service.
//!
//! The `SupervisorBuilder` wires the state store, notifier and alert engine
//! together. The `Supervisor` then runs:
//!
//! - a signal handler that starts a graceful shutdown on SIGINT/SIGTERM,
//! - the HTTP change source (when enabled),
//! - the event loop, which hands every `FlagChange` to the alert engine in
//!   its own task so a failure on one pair never blocks another,
//! - the reconciliation loop, which re-derives reminder obligations from the
//!   store.
//!
//! On shutdown it cancels all reminder timers, shuts down the notifier and
//! closes the store, bounded by `shutdown_timeout`.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use thiserror::Error;
use tokio::{
    signal,
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    engine::{AlertEngine, AlertEngineError, ReconcileSummary},
    http_client::HttpClientPool,
    http_server,
    models::FlagChange,
    notification::{NotificationError, Notifier},
    persistence::{
        error::PersistenceError,
        traits::{DeviceStore, StateStore},
    },
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A state store was not provided to the `SupervisorBuilder`.
    #[error("Missing state store for Supervisor")]
    MissingStateStore,

    /// An error occurred due to an invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The notifier or message templates could not be set up.
    #[error("Notification setup error: {0}")]
    Notification(#[from] NotificationError),

    /// The state store failed outside of a single engine invocation.
    #[error("State store error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The alert engine failed.
    #[error("Alert engine error: {0}")]
    AlertEngine(#[from] AlertEngineError),
}

/// The primary runtime manager for the application.
pub struct Supervisor<S: DeviceStore + 'static> {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The state store, shared with the engine and the HTTP server.
    store: Arc<S>,

    /// The alert engine consuming flag changes.
    engine: Arc<AlertEngine<S>>,

    /// The delivery channel, shut down on exit.
    notifier: Arc<dyn Notifier>,

    /// HTTP clients used by the notifier, released on exit.
    http_pool: Arc<HttpClientPool>,

    /// Sending half of the flag change channel.
    events_tx: mpsc::Sender<FlagChange>,

    /// Receiving half, taken by `run`.
    events_rx: Option<mpsc::Receiver<FlagChange>>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: JoinSet<()>,
}

impl<S: DeviceStore + 'static> Supervisor<S> {
    /// Creates a new Supervisor instance with all its required components.
    pub fn new(
        config: AppConfig,
        store: Arc<S>,
        engine: Arc<AlertEngine<S>>,
        notifier: Arc<dyn Notifier>,
        http_pool: Arc<HttpClientPool>,
    ) -> Self {
        let capacity = config.event_channel_capacity.max(1) as usize;
        let (events_tx, events_rx) = mpsc::channel(capacity);
        Self {
            config: Arc::new(config),
            store,
            engine,
            notifier,
            http_pool,
            events_tx,
            events_rx: Some(events_rx),
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder<S> {
        SupervisorBuilder::new()
    }

    /// A sender for feeding flag changes to the engine from other sources.
    pub fn event_sender(&self) -> mpsc::Sender<FlagChange> {
        self.events_tx.clone()
    }

    /// The token that, once cancelled, stops `run`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// The alert engine.
    pub fn engine(&self) -> &Arc<AlertEngine<S>> {
        &self.engine
    }

    /// Starts all services and blocks until shutdown.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let Some(mut events_rx) = self.events_rx.take() else {
            return Err(SupervisorError::InvalidConfiguration(
                "Supervisor event channel already consumed".to_string(),
            ));
        };

        // Spawn a task to listen for shutdown signals.
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => return,
            }

            cancellation_token.cancel();
        });

        // Spawn the HTTP change source.
        if self.config.server.enabled {
            let config = Arc::clone(&self.config);
            let repo: Arc<dyn DeviceStore> = self.store.clone();
            let events_tx = self.events_tx.clone();
            let token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                if let Err(e) =
                    http_server::run_server_from_config(config, repo, events_tx, token.clone())
                        .await
                {
                    tracing::error!(error = %e, "HTTP server failed. Initiating shutdown.");
                    token.cancel();
                }
            });
        }

        // Spawn the event loop.
        let engine = Arc::clone(&self.engine);
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                        if let Err(e) = result {
                            tracing::error!("Flag change task failed: {:?}", e);
                        }
                    }
                    maybe_change = events_rx.recv() => {
                        let Some(change) = maybe_change else { break };
                        let engine = Arc::clone(&engine);
                        in_flight.spawn(async move {
                            if let Err(e) = engine.on_flag_change(&change).await {
                                tracing::error!(
                                    device_id = %change.device_id,
                                    condition_id = %change.condition_id,
                                    error = %e,
                                    "Failed to process flag change."
                                );
                            }
                        });
                    }
                }
            }
            // Let changes already handed to the engine finish.
            while in_flight.join_next().await.is_some() {}
            tracing::info!("Event loop stopped.");
        });

        // Spawn the reconciliation loop.
        let scheduler = self.engine.scheduler().clone();
        let reconcile_interval = self.config.reminders.reconcile_interval;
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            tokio::select! {
                _ = scheduler.run(reconcile_interval) => {}
                _ = token.cancelled() => {}
            }
        });

        tracing::info!("Supervisor started.");

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // --- Graceful Shutdown ---
        let shutdown_timeout = self.config.shutdown_timeout;
        self.engine.shutdown();

        let drain = async { while self.join_set.join_next().await.is_some() {} };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!("Supervised tasks did not stop within {:?}; aborting.", shutdown_timeout);
        }
        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        self.cleanup().await;
        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }

    /// Runs a single reconciliation sweep and releases all resources. Used for
    /// cron-style deployments without a long-lived process.
    pub async fn reconcile_once(self) -> Result<ReconcileSummary, SupervisorError> {
        let result = self.engine.scheduler().reconcile().await;
        self.engine.shutdown();
        self.cleanup().await;
        Ok(result?)
    }

    async fn cleanup(&self) {
        tracing::info!("Starting graceful resource cleanup...");
        let shutdown_timeout = self.config.shutdown_timeout;

        let cleanup_logic = async {
            if let Err(e) = self.notifier.shutdown().await {
                tracing::error!(error = %e, "Failed to shut down notifier, but continuing cleanup.");
            }
            self.http_pool.clear().await;

            if let Err(e) = self.store.flush().await {
                tracing::error!(error = %e, "Failed to flush pending writes, but continuing cleanup.");
            }
            self.store.close().await;

            for entry in self.engine.dispatched_notifications().iter() {
                tracing::info!(
                    condition_id = %entry.key(),
                    count = *entry.value(),
                    "Notifications delivered during this run."
                );
            }
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Cleanup completed successfully.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::ServerConfig,
        persistence::traits::DeviceRepository,
        test_helpers::{InMemoryStateStore, RecordingNotifier},
    };

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            recipient_address: "admin@example.com".to_string(),
            server: ServerConfig { enabled: false, ..Default::default() },
            shutdown_timeout: Duration::from_secs(5),
            event_channel_capacity: 16,
            ..Default::default()
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_run_processes_events_and_shuts_down() {
        let store = Arc::new(InMemoryStateStore::new());
        store.set_owner("D1", Some("user-1")).await.unwrap();
        let notifier = Arc::new(RecordingNotifier::new());

        let supervisor = Supervisor::builder()
            .config(test_config())
            .store(Arc::clone(&store))
            .notifier(notifier.clone())
            .build()
            .await
            .unwrap();
        let events_tx = supervisor.event_sender();
        let token = supervisor.cancellation_token();
        let handle = tokio::spawn(supervisor.run());

        let change = store.write_flag("D1", "water-leak", true).await.unwrap();
        events_tx.send(change).await.unwrap();

        wait_for(|| notifier.count() == 1).await;
        assert_eq!(notifier.sent()[0].recipient_address, "admin@example.com");
        assert!(store.condition("D1", "water-leak").last_notified_at.is_some());

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(10), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_reconcile_once_notifies_due_conditions() {
        let store = Arc::new(InMemoryStateStore::new());
        store.set_owner("D1", Some("user-1")).await.unwrap();
        store.write_flag("D1", "high-humidity", true).await.unwrap();
        store.write_flag("D2", "unsupported-sensor", true).await.unwrap();
        let notifier = Arc::new(RecordingNotifier::new());

        let mut config = test_config();
        config.reminders.in_process_timers = false;
        let supervisor = Supervisor::builder()
            .config(config)
            .store(Arc::clone(&store))
            .notifier(notifier.clone())
            .build()
            .await
            .unwrap();

        let summary = supervisor.reconcile_once().await.unwrap();
        assert_eq!(summary, ReconcileSummary { scanned: 1, notified: 1, failed: 0 });
        assert_eq!(notifier.count(), 1);
    }
}
