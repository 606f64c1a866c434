//! Reacts to condition flag changes.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use super::{
    classifier::classify,
    reminder::{NotifyOutcome, ReminderScheduler},
};
use crate::{
    models::FlagChange,
    persistence::{error::PersistenceError, traits::StateStore},
};

/// Errors that can occur within the AlertEngine
#[derive(Debug, Error)]
pub enum AlertEngineError {
    /// The state store could not be read or written. Fatal for the single
    /// invocation that hit it.
    #[error("State store error: {0}")]
    StateStore(#[from] PersistenceError),
}

/// The AlertEngine turns flag changes into immediate notifications, reminder
/// obligations and state cleanup.
pub struct AlertEngine<S: StateStore + 'static> {
    store: Arc<S>,
    scheduler: ReminderScheduler<S>,
}

impl<S: StateStore + 'static> AlertEngine<S> {
    /// Creates a new AlertEngine around `scheduler`, which must share `store`.
    pub fn new(store: Arc<S>, scheduler: ReminderScheduler<S>) -> Self {
        Self { store, scheduler }
    }

    /// Handles one flag change event.
    ///
    /// In order: an activation edge notifies immediately (subject to the
    /// stored timestamp, so a redelivered edge is a no-op); any write that
    /// leaves the flag set ensures a reminder is pending; a deactivation edge
    /// cancels the reminder and drops the stored timestamp, unless the flag
    /// has been set again since. Unknown condition ids are ignored without
    /// touching the store.
    #[tracing::instrument(skip(self, change), fields(device_id = %change.device_id, condition_id = %change.condition_id))]
    pub async fn on_flag_change(&self, change: &FlagChange) -> Result<(), AlertEngineError> {
        if classify(&change.condition_id).is_none() {
            tracing::debug!("Condition id does not raise alerts; ignoring.");
            return Ok(());
        }

        let key = change.key();
        let lock = self.scheduler.pair_lock(&key);
        let guard = lock.lock().await;

        let mut evaluated: Option<NotifyOutcome> = None;
        if change.is_activation() {
            tracing::info!("Condition activated.");
            evaluated = Some(self.scheduler.notify_if_due_locked(&key).await?);
        }

        if change.is_active() {
            self.scheduler.ensure_reminder_locked(&key, evaluated).await?;
        }

        let mut cleared = false;
        if change.is_deactivation() {
            cleared = self.store.clear_condition(&change.device_id, &change.condition_id).await?;
            if cleared {
                tracing::info!("Condition cleared.");
                self.scheduler.disarm(&key);
            } else {
                tracing::info!("Condition is active again; stale deactivation ignored.");
            }
        }

        drop(guard);
        drop(lock);
        if cleared {
            self.scheduler.release_pair_lock(&key);
        }

        Ok(())
    }

    /// The reminder scheduler driving this engine.
    pub fn scheduler(&self) -> &ReminderScheduler<S> {
        &self.scheduler
    }

    /// Gets the count of delivered notifications by condition id.
    pub fn dispatched_notifications(&self) -> &DashMap<String, usize> {
        self.scheduler.dispatched_notifications()
    }

    /// Stops all reminder activity.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down alert engine...");
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        config::ReminderConfig,
        models::{ConditionState, NotificationMessage, Recipient},
        notification::{MessageComposer, MockNotifier},
        persistence::traits::MockStateStore,
        test_helpers::ManualClock,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_engine(store: MockStateStore, notifier: MockNotifier) -> AlertEngine<MockStateStore> {
        let store = Arc::new(store);
        let config = ReminderConfig { in_process_timers: false, ..Default::default() };
        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(notifier),
            Arc::new(MessageComposer::new(NotificationMessage::default()).unwrap()),
            Arc::new(ManualClock::new(t0())),
            &config,
            "ops@example.com",
        );
        AlertEngine::new(store, scheduler)
    }

    fn expect_owned_device(store: &mut MockStateStore) {
        store.expect_get_owner().returning(|_| Ok(Some("user-1".to_string())));
        store.expect_get_recipient().returning(|_, _| {
            Ok(Some(Recipient { name: Some("Ada".to_string()), ..Default::default() }))
        });
    }

    #[tokio::test]
    async fn test_unknown_condition_touches_nothing() {
        // No expectations: any store or notifier call fails the test.
        let engine = create_engine(MockStateStore::new(), MockNotifier::new());

        let change = FlagChange::new("D2", "unsupported-sensor", None, Some(true));
        engine.on_flag_change(&change).await.unwrap();

        let change = FlagChange::new("D2", "unsupported-sensor", Some(true), Some(false));
        engine.on_flag_change(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_activation_edge_notifies_once() {
        let mut store = MockStateStore::new();
        store
            .expect_get_condition_state()
            .with(eq("D1"), eq("high-temperature"))
            .times(1)
            .returning(|_, _| Ok(ConditionState { active: true, last_notified_at: None }));
        expect_owned_device(&mut store);
        store
            .expect_set_last_notified()
            .withf(|d, c, at| d == "D1" && c == "high-temperature" && *at == t0())
            .times(1)
            .returning(|_, _, _| Ok(true));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|_, subject, body| {
                subject == "Alert for Device D1"
                    && body.contains("Alert: high temperature")
                    && body.contains("- Name: Ada")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let engine = create_engine(store, notifier);
        let change = FlagChange::new("D1", "high-temperature", Some(false), Some(true));
        engine.on_flag_change(&change).await.unwrap();

        assert_eq!(*engine.dispatched_notifications().get("high-temperature").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_alias_is_counted_under_canonical_id() {
        let mut store = MockStateStore::new();
        store
            .expect_get_condition_state()
            .with(eq("D1"), eq("ledWaterLeak"))
            .returning(|_, _| Ok(ConditionState { active: true, last_notified_at: None }));
        expect_owned_device(&mut store);
        store.expect_set_last_notified().times(1).returning(|_, _, _| Ok(true));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|_, _, body| body.contains("water leak detected"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let engine = create_engine(store, notifier);
        engine.on_flag_change(&FlagChange::new("D1", "ledWaterLeak", None, Some(true))).await.unwrap();

        assert_eq!(*engine.dispatched_notifications().get("water-leak").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_steady_state_write_within_interval_does_not_notify() {
        let mut store = MockStateStore::new();
        store
            .expect_get_condition_state()
            .times(1)
            .returning(|_, _| Ok(ConditionState { active: true, last_notified_at: Some(t0()) }));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let engine = create_engine(store, notifier);
        let change = FlagChange::new("D1", "high-temperature", Some(true), Some(true));
        engine.on_flag_change(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_deactivation_clears_condition() {
        let mut store = MockStateStore::new();
        store
            .expect_clear_condition()
            .with(eq("D1"), eq("high-temperature"))
            .times(1)
            .returning(|_, _| Ok(true));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let engine = create_engine(store, notifier);
        let change = FlagChange::new("D1", "high-temperature", Some(true), Some(false));
        engine.on_flag_change(&change).await.unwrap();

        assert_eq!(engine.scheduler().tracked_pairs(), 0);
    }

    #[tokio::test]
    async fn test_stale_deactivation_keeps_reactivated_pair() {
        let mut store = MockStateStore::new();
        store.expect_clear_condition().times(1).returning(|_, _| Ok(false));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let engine = create_engine(store, notifier);
        let change = FlagChange::new("D1", "water-leak", Some(true), Some(false));
        engine.on_flag_change(&change).await.unwrap();

        assert_eq!(engine.scheduler().tracked_pairs(), 1);
    }

    #[tokio::test]
    async fn test_pair_lock_is_kept_while_active() {
        let mut store = MockStateStore::new();
        store
            .expect_get_condition_state()
            .returning(|_, _| Ok(ConditionState { active: true, last_notified_at: Some(t0()) }));

        let engine = create_engine(store, MockNotifier::new());
        let change = FlagChange::new("D1", "high-humidity", Some(true), Some(true));
        engine.on_flag_change(&change).await.unwrap();

        assert_eq!(engine.scheduler().tracked_pairs(), 1);
    }

    #[tokio::test]
    async fn test_write_without_edge_while_inactive_is_a_no_op() {
        let engine = create_engine(MockStateStore::new(), MockNotifier::new());
        let change = FlagChange::new("D1", "high-temperature", Some(false), Some(false));
        engine.on_flag_change(&change).await.unwrap();

        let change = FlagChange::new("D1", "high-temperature", None, None);
        engine.on_flag_change(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_on_deactivation_is_reported() {
        let mut store = MockStateStore::new();
        store
            .expect_clear_condition()
            .returning(|_, _| Err(PersistenceError::OperationFailed("disk full".to_string())));

        let engine = create_engine(store, MockNotifier::new());
        let change = FlagChange::new("D1", "water-leak", Some(true), None);
        let result = engine.on_flag_change(&change).await;
        assert!(matches!(result, Err(AlertEngineError::StateStore(_))));
    }
}
