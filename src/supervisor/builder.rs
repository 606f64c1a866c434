//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    engine::{AlertEngine, Clock, ReminderScheduler, SystemClock},
    http_client::HttpClientPool,
    notification::{MessageComposer, Notifier, create_notifier},
    persistence::traits::DeviceStore,
};

/// A builder for creating a `Supervisor` instance.
pub struct SupervisorBuilder<S: DeviceStore + 'static> {
    config: Option<AppConfig>,
    store: Option<Arc<S>>,
    notifier: Option<Arc<dyn Notifier>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<S: DeviceStore + 'static> Default for SupervisorBuilder<S> {
    fn default() -> Self {
        Self { config: None, store: None, notifier: None, clock: None }
    }
}

impl<S: DeviceStore + 'static> SupervisorBuilder<S> {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state store for the `Supervisor`.
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the notifier built from `config.notifier`.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validates the configuration and wires the notifier, message composer,
    /// reminder scheduler and alert engine.
    pub async fn build(self) -> Result<Supervisor<S>, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let store = self.store.ok_or(SupervisorError::MissingStateStore)?;

        if config.recipient_address.trim().is_empty() {
            return Err(SupervisorError::InvalidConfiguration(
                "recipient_address must not be empty".to_string(),
            ));
        }
        if config.reminders.interval.is_zero() {
            return Err(SupervisorError::InvalidConfiguration(
                "reminders.interval_secs must be greater than zero".to_string(),
            ));
        }
        if config.reminders.reconcile_interval.is_zero() {
            return Err(SupervisorError::InvalidConfiguration(
                "reminders.reconcile_interval_secs must be greater than zero".to_string(),
            ));
        }

        let http_pool = Arc::new(HttpClientPool::new());
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => create_notifier(&config.notifier, &http_pool).await?,
        };
        let composer = Arc::new(MessageComposer::new(config.message.clone())?);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            composer,
            clock,
            &config.reminders,
            config.recipient_address.clone(),
        );
        let engine = Arc::new(AlertEngine::new(Arc::clone(&store), scheduler));

        tracing::info!(
            interval = ?config.reminders.interval,
            reconcile_interval = ?config.reminders.reconcile_interval,
            in_process_timers = config.reminders.in_process_timers,
            "Alert engine configured."
        );

        Ok(Supervisor::new(config, store, engine, notifier, http_pool))
    }
}
