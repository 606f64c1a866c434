//! Reminder scheduling for active conditions.
//!
//! Every notification decision goes through the stored `last_notified_at`
//! timestamp, so at most one notification per interval is sent for a pair no
//! matter how many timers, sweeps or processes evaluate it. In-process timers
//! only decide *when* a pair is looked at again; the periodic reconciliation
//! sweep re-derives the same obligations from the store after a restart.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{alert_engine::AlertEngineError, classifier::ConditionKind, clock::Clock};
use crate::{
    config::ReminderConfig,
    models::{ConditionKey, Recipient},
    notification::{MessageComposer, Notifier},
    persistence::traits::StateStore,
};

/// What a single evaluation of a pair decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The condition id does not raise alerts.
    Ignored,
    /// The pair's flag is not set.
    Inactive,
    /// The last notification is still within the interval.
    NotYetDue {
        /// When the pair becomes due again.
        due_at: DateTime<Utc>,
    },
    /// The device has no owner; nothing was sent or recorded.
    Suppressed,
    /// A delivery was attempted and its time recorded.
    Attempted {
        /// The recorded attempt time.
        at: DateTime<Utc>,
        /// Whether the notifier reported success.
        delivered: bool,
    },
}

/// Counters from one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Active alerting pairs found in the store.
    pub scanned: usize,
    /// Pairs for which a notification was attempted.
    pub notified: usize,
    /// Pairs whose evaluation failed.
    pub failed: usize,
}

struct TimerHandle {
    id: u64,
    due_at: DateTime<Utc>,
    token: CancellationToken,
}

/// Evaluates reminder obligations and drives per-pair wake-ups.
///
/// Cloning is cheap; clones share timers, locks and counters.
pub struct ReminderScheduler<S: StateStore + 'static> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    composer: Arc<MessageComposer>,
    clock: Arc<dyn Clock>,
    interval: TimeDelta,
    in_process_timers: bool,
    recipient_address: Arc<str>,
    timers: Arc<DashMap<ConditionKey, TimerHandle>>,
    next_timer_id: Arc<AtomicU64>,
    pair_locks: Arc<DashMap<ConditionKey, Arc<Mutex<()>>>>,
    dispatched_notifications: Arc<DashMap<String, usize>>,
    shutdown_token: CancellationToken,
}

impl<S: StateStore + 'static> Clone for ReminderScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            composer: Arc::clone(&self.composer),
            clock: Arc::clone(&self.clock),
            interval: self.interval,
            in_process_timers: self.in_process_timers,
            recipient_address: Arc::clone(&self.recipient_address),
            timers: Arc::clone(&self.timers),
            next_timer_id: Arc::clone(&self.next_timer_id),
            pair_locks: Arc::clone(&self.pair_locks),
            dispatched_notifications: Arc::clone(&self.dispatched_notifications),
            shutdown_token: self.shutdown_token.clone(),
        }
    }
}

impl<S: StateStore + 'static> ReminderScheduler<S> {
    /// Creates a new scheduler. Notifications are addressed to
    /// `recipient_address`.
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        composer: Arc<MessageComposer>,
        clock: Arc<dyn Clock>,
        config: &ReminderConfig,
        recipient_address: impl Into<String>,
    ) -> Self {
        let recipient_address: String = recipient_address.into();
        Self {
            store,
            notifier,
            composer,
            clock,
            interval: TimeDelta::from_std(config.interval).unwrap_or(TimeDelta::MAX),
            in_process_timers: config.in_process_timers,
            recipient_address: Arc::from(recipient_address),
            timers: Arc::new(DashMap::new()),
            next_timer_id: Arc::new(AtomicU64::new(0)),
            pair_locks: Arc::new(DashMap::new()),
            dispatched_notifications: Arc::new(DashMap::new()),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets or creates the lock serializing evaluations of one pair within
    /// this process.
    pub(crate) fn pair_lock(&self, key: &ConditionKey) -> Arc<Mutex<()>> {
        self.pair_locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Forgets the lock of `key` unless another evaluation still holds it.
    pub(crate) fn release_pair_lock(&self, key: &ConditionKey) {
        self.pair_locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn tracked_pairs(&self) -> usize {
        self.pair_locks.len()
    }

    fn due_at(&self, last_notified_at: DateTime<Utc>) -> DateTime<Utc> {
        last_notified_at.checked_add_signed(self.interval).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Notifies for `key` if it is active and no notification was attempted
    /// within the last interval. Does not touch timers.
    pub async fn notify_if_due(&self, key: &ConditionKey) -> Result<NotifyOutcome, AlertEngineError> {
        let lock = self.pair_lock(key);
        let _guard = lock.lock().await;
        self.notify_if_due_locked(key).await
    }

    /// Runs [`Self::notify_if_due`] and arms a wake-up for the next time the
    /// pair becomes due.
    pub async fn ensure_reminder(
        &self,
        key: &ConditionKey,
    ) -> Result<NotifyOutcome, AlertEngineError> {
        let lock = self.pair_lock(key);
        let _guard = lock.lock().await;
        self.ensure_reminder_locked(key, None).await
    }

    /// Caller must hold the pair lock.
    pub(crate) async fn notify_if_due_locked(
        &self,
        key: &ConditionKey,
    ) -> Result<NotifyOutcome, AlertEngineError> {
        let Some(kind) = ConditionKind::from_id(&key.condition_id) else {
            return Ok(NotifyOutcome::Ignored);
        };

        let state = self.store.get_condition_state(&key.device_id, &key.condition_id).await?;
        if !state.active {
            tracing::debug!(%key, "Condition is not active; nothing to notify.");
            return Ok(NotifyOutcome::Inactive);
        }

        let now = self.clock.now();
        if let Some(last) = state.last_notified_at {
            let due_at = self.due_at(last);
            if due_at > now {
                tracing::debug!(%key, %due_at, "Notification not yet due.");
                return Ok(NotifyOutcome::NotYetDue { due_at });
            }
        }

        let Some(owner_id) = self.store.get_owner(&key.device_id).await? else {
            tracing::warn!(
                device_id = %key.device_id,
                condition_id = %key.condition_id,
                "Device has no owner reference; notification suppressed."
            );
            return Ok(NotifyOutcome::Suppressed);
        };

        let recipient = match self.store.get_recipient(&owner_id, &key.device_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => {
                tracing::warn!(
                    device_id = %key.device_id,
                    owner_id = %owner_id,
                    "Owner contact profile not found; sending with placeholders."
                );
                Recipient::unknown()
            }
            Err(e) => {
                tracing::warn!(
                    device_id = %key.device_id,
                    owner_id = %owner_id,
                    error = %e,
                    "Failed to fetch owner contact profile; sending with placeholders."
                );
                Recipient::unknown()
            }
        };

        let delivered = self.deliver(kind, key, &recipient).await;

        // A failed attempt still consumes the interval.
        if !self.store.set_last_notified(&key.device_id, &key.condition_id, now).await? {
            tracing::debug!(%key, "Condition cleared during delivery; attempt time not recorded.");
        }

        Ok(NotifyOutcome::Attempted { at: now, delivered })
    }

    async fn deliver(&self, kind: ConditionKind, key: &ConditionKey, recipient: &Recipient) -> bool {
        let message = match self.composer.compose(kind.reason(), key, recipient) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(%key, error = %e, "Failed to compose alert notification.");
                return false;
            }
        };

        match self.notifier.send(&self.recipient_address, &message.subject, &message.body).await {
            Ok(()) => {
                tracing::info!(
                    device_id = %key.device_id,
                    condition_id = %key.condition_id,
                    reason = kind.reason(),
                    "Alert notification sent."
                );
                *self.dispatched_notifications.entry(kind.id().to_string()).or_insert(0) += 1;
                true
            }
            Err(e) => {
                tracing::error!(
                    device_id = %key.device_id,
                    condition_id = %key.condition_id,
                    error = %e,
                    "Failed to deliver alert notification."
                );
                false
            }
        }
    }

    /// Caller must hold the pair lock. `evaluated` is an outcome the caller
    /// already obtained from [`Self::notify_if_due_locked`] under the same
    /// lock.
    pub(crate) async fn ensure_reminder_locked(
        &self,
        key: &ConditionKey,
        evaluated: Option<NotifyOutcome>,
    ) -> Result<NotifyOutcome, AlertEngineError> {
        let outcome = match evaluated {
            Some(outcome) => outcome,
            None => self.notify_if_due_locked(key).await?,
        };

        match &outcome {
            NotifyOutcome::NotYetDue { due_at } => self.arm(key, *due_at),
            NotifyOutcome::Attempted { at, .. } => self.arm(key, self.due_at(*at)),
            // The owner may be assigned later; look again after an interval.
            NotifyOutcome::Suppressed => self.arm(key, self.due_at(self.clock.now())),
            NotifyOutcome::Ignored | NotifyOutcome::Inactive => self.disarm(key),
        }

        Ok(outcome)
    }

    fn arm(&self, key: &ConditionKey, due_at: DateTime<Utc>) {
        if !self.in_process_timers || self.shutdown_token.is_cancelled() {
            return;
        }
        if let Some(existing) = self.timers.get(key)
            && existing.due_at == due_at
        {
            return;
        }

        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown_token.child_token();
        let handle = TimerHandle { id, due_at, token: token.clone() };
        if let Some(previous) = self.timers.insert(key.clone(), handle) {
            previous.token.cancel();
        }

        let delay = (due_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(%key, %due_at, "Reminder armed.");

        let scheduler = self.clone();
        let key = key.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => scheduler.on_wake(key, id).await,
            }
        });
    }

    async fn on_wake(&self, key: ConditionKey, id: u64) {
        let lock = self.pair_lock(&key);
        let _guard = lock.lock().await;

        // Superseded by a newer timer, or disarmed while waiting for the lock.
        if self.timers.remove_if(&key, |_, handle| handle.id == id).is_none() {
            return;
        }

        match self.store.get_flag(&key.device_id, &key.condition_id).await {
            Ok(Some(true)) => {
                if let Err(e) = self.ensure_reminder_locked(&key, None).await {
                    tracing::error!(%key, error = %e, "Reminder evaluation failed.");
                }
            }
            Ok(_) => tracing::debug!(%key, "Condition no longer active; reminder exits."),
            Err(e) => tracing::error!(%key, error = %e, "Failed to read condition flag on wake-up."),
        }
    }

    /// Cancels the pending wake-up for `key`, if any.
    pub fn disarm(&self, key: &ConditionKey) {
        if let Some((_, handle)) = self.timers.remove(key) {
            handle.token.cancel();
            tracing::debug!(%key, "Reminder disarmed.");
        }
    }

    /// Returns whether a wake-up is pending for `key`.
    pub fn is_armed(&self, key: &ConditionKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Number of pending wake-ups.
    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Scans every active condition in the store, notifies the due ones and
    /// arms wake-ups for any pair without one.
    pub async fn reconcile(&self) -> Result<ReconcileSummary, AlertEngineError> {
        let active = self.store.list_active_conditions().await?;
        let now = self.clock.now();
        let mut summary = ReconcileSummary::default();

        for (key, state) in active {
            if ConditionKind::from_id(&key.condition_id).is_none() {
                continue;
            }
            summary.scanned += 1;

            let due = state.last_notified_at.is_none_or(|last| self.due_at(last) <= now);
            if !due && self.is_armed(&key) {
                continue;
            }

            let lock = self.pair_lock(&key);
            let _guard = lock.lock().await;
            match self.ensure_reminder_locked(&key, None).await {
                Ok(NotifyOutcome::Attempted { .. }) => summary.notified += 1,
                Ok(_) => {}
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(%key, error = %e, "Failed to reconcile condition.");
                }
            }
        }

        tracing::debug!(
            scanned = summary.scanned,
            notified = summary.notified,
            failed = summary.failed,
            "Reconciliation sweep finished."
        );
        Ok(summary)
    }

    /// Runs the reconciliation sweep every `every` until [`Self::shutdown`]
    /// is called. The first sweep runs immediately.
    pub async fn run(&self, every: Duration) {
        let mut interval = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Reconciliation loop stopped.");
                    break;
                }
                _ = interval.tick() => {
                    // Errors never stop the loop.
                    if let Err(e) = self.reconcile().await {
                        tracing::error!("Error in reconciliation cycle: {}", e);
                    }
                }
            }
        }
    }

    /// Gets the count of successfully delivered notifications by condition
    /// id.
    pub fn dispatched_notifications(&self) -> &DashMap<String, usize> {
        &self.dispatched_notifications
    }

    /// Cancels every pending wake-up and stops the reconciliation loop. No
    /// new wake-ups are armed afterwards.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
        self.timers.clear();
    }
}
