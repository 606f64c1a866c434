//! Condition flags, flag-change events and the per-pair debounce state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Addresses a single (device, condition) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionKey {
    /// Opaque device identifier.
    pub device_id: String,
    /// Condition identifier, e.g. `high-temperature`.
    pub condition_id: String,
}

impl ConditionKey {
    /// Creates a new key for the given device and condition.
    pub fn new(device_id: impl Into<String>, condition_id: impl Into<String>) -> Self {
        Self { device_id: device_id.into(), condition_id: condition_id.into() }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.condition_id)
    }
}

/// Persisted state of a (device, condition) pair.
///
/// `last_notified_at` is only ever present while `active` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionState {
    /// Mirrors the device's current flag for this condition.
    pub active: bool,
    /// When the last notification for the current activation was attempted.
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// A single condition-flag write, as delivered by a change source.
///
/// Delivery is at-least-once, so the same change may be observed more than
/// once. Absent values are treated as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagChange {
    /// The device whose flag was written.
    pub device_id: String,
    /// The condition flag that was written.
    pub condition_id: String,
    /// The value before the write, if any.
    #[serde(default)]
    pub previous: Option<bool>,
    /// The value after the write, if any.
    #[serde(default)]
    pub new: Option<bool>,
}

impl FlagChange {
    /// Creates a new flag change event.
    pub fn new(
        device_id: impl Into<String>,
        condition_id: impl Into<String>,
        previous: Option<bool>,
        new: Option<bool>,
    ) -> Self {
        Self { device_id: device_id.into(), condition_id: condition_id.into(), previous, new }
    }

    /// Returns the pair this change addresses.
    pub fn key(&self) -> ConditionKey {
        ConditionKey::new(&self.device_id, &self.condition_id)
    }

    /// The flag is true after this write.
    pub fn is_active(&self) -> bool {
        self.new.unwrap_or(false)
    }

    /// The flag went from false/absent to true.
    pub fn is_activation(&self) -> bool {
        self.is_active() && !self.previous.unwrap_or(false)
    }

    /// The flag went from true to false/absent.
    pub fn is_deactivation(&self) -> bool {
        !self.is_active() && self.previous.unwrap_or(false)
    }
}
