use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

fn default_interval() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_in_process_timers() -> bool {
    true
}

/// Reminder cadence and how reminder obligations are driven.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ReminderConfig {
    /// Minimum time between two notifications for the same active condition.
    #[serde(
        rename = "interval_secs",
        default = "default_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub interval: Duration,

    /// How often the reconciliation sweep scans active conditions.
    #[serde(
        rename = "reconcile_interval_secs",
        default = "default_reconcile_interval",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub reconcile_interval: Duration,

    /// Arm one wake-up task per active condition in addition to the sweep.
    #[serde(default = "default_in_process_timers")]
    pub in_process_timers: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            reconcile_interval: default_reconcile_interval(),
            in_process_timers: default_in_process_timers(),
        }
    }
}
