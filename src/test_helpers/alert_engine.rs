use std::{sync::Arc, time::Duration};

use crate::{
    config::ReminderConfig,
    engine::{AlertEngine, Clock, ReminderScheduler},
    models::NotificationMessage,
    notification::{MessageComposer, Notifier},
    persistence::{sqlite::SqliteStateRepository, traits::StateStore},
};

/// Address the test engines send to.
pub const TEST_RECIPIENT_ADDRESS: &str = "admin@example.com";

/// Builds an AlertEngine over `store` with the default message templates.
pub fn create_test_alert_engine<S: StateStore + 'static>(
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    in_process_timers: bool,
) -> AlertEngine<S> {
    let config =
        ReminderConfig { interval, in_process_timers, ..ReminderConfig::default() };
    let composer = MessageComposer::new(NotificationMessage::default())
        .expect("default templates should be valid");
    let scheduler = ReminderScheduler::new(
        Arc::clone(&store),
        notifier,
        Arc::new(composer),
        clock,
        &config,
        TEST_RECIPIENT_ADDRESS,
    );
    AlertEngine::new(store, scheduler)
}

/// Creates a migrated in-memory SQLite store.
pub async fn create_test_sqlite_store() -> Arc<SqliteStateRepository> {
    let store = SqliteStateRepository::new("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory db");
    store.run_migrations().await.expect("Failed to run migrations");
    Arc::new(store)
}
