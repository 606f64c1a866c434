use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{ConditionKey, ConditionState, FlagChange, Recipient},
    persistence::{
        error::PersistenceError,
        traits::{DeviceRepository, StateStore},
    },
};

#[derive(Default)]
struct Inner {
    conditions: HashMap<ConditionKey, ConditionState>,
    owners: HashMap<String, String>,
    recipients: HashMap<(String, String), Recipient>,
}

/// An in-memory store with the same semantics as the SQLite store.
///
/// Counts every write the engine issues and can be switched into an
/// unavailable mode where every call fails.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    recipient_unavailable: AtomicBool,
    engine_writes: AtomicUsize,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes recipient lookups fail while the rest of the store works.
    pub fn set_recipient_unavailable(&self, unavailable: bool) {
        self.recipient_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `set_last_notified` and `clear_condition` calls received.
    pub fn engine_writes(&self) -> usize {
        self.engine_writes.load(Ordering::SeqCst)
    }

    /// Reads a pair's state without going through the async trait.
    pub fn condition(&self, device_id: &str, condition_id: &str) -> ConditionState {
        self.inner
            .lock()
            .unwrap()
            .conditions
            .get(&ConditionKey::new(device_id, condition_id))
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::OperationFailed("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_condition_state(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<ConditionState, PersistenceError> {
        self.check()?;
        Ok(self.condition(device_id, condition_id))
    }

    async fn get_flag(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<Option<bool>, PersistenceError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.conditions.get(&ConditionKey::new(device_id, condition_id)).map(|s| s.active))
    }

    async fn set_last_notified(
        &self,
        device_id: &str,
        condition_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        self.check()?;
        self.engine_writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        match inner.conditions.get_mut(&ConditionKey::new(device_id, condition_id)) {
            Some(state) if state.active => {
                state.last_notified_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_condition(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<bool, PersistenceError> {
        self.check()?;
        self.engine_writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().unwrap();
        match inner.conditions.get_mut(&ConditionKey::new(device_id, condition_id)) {
            Some(state) if state.active => Ok(false),
            Some(state) => {
                state.last_notified_at = None;
                Ok(true)
            }
            None => Ok(true),
        }
    }

    async fn get_owner(&self, device_id: &str) -> Result<Option<String>, PersistenceError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.owners.get(device_id).filter(|owner| !owner.is_empty()).cloned())
    }

    async fn get_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
    ) -> Result<Option<Recipient>, PersistenceError> {
        self.check()?;
        if self.recipient_unavailable.load(Ordering::SeqCst) {
            return Err(PersistenceError::OperationFailed("profile lookup failed".to_string()));
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner.recipients.get(&(owner_id.to_string(), device_id.to_string())).cloned())
    }

    async fn list_active_conditions(
        &self,
    ) -> Result<Vec<(ConditionKey, ConditionState)>, PersistenceError> {
        self.check()?;
        let inner = self.inner.lock().unwrap();
        let mut active: Vec<_> = inner
            .conditions
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect();
        active.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        Ok(active)
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStateStore {
    async fn write_flag(
        &self,
        device_id: &str,
        condition_id: &str,
        active: bool,
    ) -> Result<FlagChange, PersistenceError> {
        self.check()?;
        let key = ConditionKey::new(device_id, condition_id);
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.conditions.get(&key).map(|state| state.active);
        let state = inner.conditions.entry(key).or_default();
        state.active = active;
        if !active {
            state.last_notified_at = None;
        }
        Ok(FlagChange::new(device_id, condition_id, previous, Some(active)))
    }

    async fn set_owner(
        &self,
        device_id: &str,
        owner_id: Option<&str>,
    ) -> Result<(), PersistenceError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        match owner_id {
            Some(owner) => inner.owners.insert(device_id.to_string(), owner.to_string()),
            None => inner.owners.remove(device_id),
        };
        Ok(())
    }

    async fn set_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
        recipient: &Recipient,
    ) -> Result<(), PersistenceError> {
        self.check()?;
        let mut inner = self.inner.lock().unwrap();
        inner.recipients.insert((owner_id.to_string(), device_id.to_string()), recipient.clone());
        Ok(())
    }
}
