//! Storage interfaces used by the alert engine and by change sources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{ConditionKey, ConditionState, FlagChange, Recipient},
    persistence::error::PersistenceError,
};

/// The engine's view of the durable state store.
///
/// Every operation addresses a single key; no multi-key transactions are
/// required.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Retrieves the flag and debounce timestamp for a pair. A pair that was
    /// never written reads as inactive with no timestamp.
    async fn get_condition_state(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<ConditionState, PersistenceError>;

    /// Retrieves the live flag for a pair, or `None` if it was never written.
    async fn get_flag(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<Option<bool>, PersistenceError>;

    /// Records the time of the last notification attempt for a pair.
    ///
    /// The write only lands while the pair's flag is active; returns whether
    /// it did.
    async fn set_last_notified(
        &self,
        device_id: &str,
        condition_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Drops the debounce timestamp for a pair whose flag is not set.
    ///
    /// Returns `false`, leaving the timestamp in place, when the flag is set
    /// again by the time the call lands.
    async fn clear_condition(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<bool, PersistenceError>;

    /// Retrieves the owner reference of a device.
    async fn get_owner(&self, device_id: &str) -> Result<Option<String>, PersistenceError>;

    /// Retrieves the owner's contact profile for a device.
    async fn get_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
    ) -> Result<Option<Recipient>, PersistenceError>;

    /// Lists every pair whose flag is currently active.
    async fn list_active_conditions(
        &self,
    ) -> Result<Vec<(ConditionKey, ConditionState)>, PersistenceError>;

    /// Persists any buffered writes.
    async fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// Releases the store's connections. No calls may follow.
    async fn close(&self) {}
}

/// Write side used by change sources and provisioning flows.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Writes a condition flag and returns the resulting change event,
    /// carrying the value that was overwritten.
    async fn write_flag(
        &self,
        device_id: &str,
        condition_id: &str,
        active: bool,
    ) -> Result<FlagChange, PersistenceError>;

    /// Sets or removes the owner reference of a device.
    async fn set_owner(
        &self,
        device_id: &str,
        owner_id: Option<&str>,
    ) -> Result<(), PersistenceError>;

    /// Stores the owner's contact profile for a device.
    async fn set_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
        recipient: &Recipient,
    ) -> Result<(), PersistenceError>;
}

/// Combined read and write access, as needed by change sources that also
/// serve reads.
pub trait DeviceStore: StateStore + DeviceRepository {}

impl<T: StateStore + DeviceRepository + ?Sized> DeviceStore for T {}
