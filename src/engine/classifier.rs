//! Maps condition identifiers to human-readable alert reasons.

use std::fmt;

/// The closed set of conditions that raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// Temperature above the device's threshold.
    HighTemperature,
    /// Temperature below the device's threshold.
    LowTemperature,
    /// Humidity above the device's threshold.
    HighHumidity,
    /// Water sensor tripped.
    WaterLeak,
}

impl ConditionKind {
    /// Every alerting condition.
    pub const ALL: [ConditionKind; 4] = [
        ConditionKind::HighTemperature,
        ConditionKind::LowTemperature,
        ConditionKind::HighHumidity,
        ConditionKind::WaterLeak,
    ];

    /// Resolves a condition identifier. Device firmware writes the `led*`
    /// names, which are accepted alongside the canonical ones.
    pub fn from_id(condition_id: &str) -> Option<Self> {
        match condition_id {
            "high-temperature" | "ledHighTemp" => Some(ConditionKind::HighTemperature),
            "low-temperature" | "ledLowTemp" => Some(ConditionKind::LowTemperature),
            "high-humidity" | "ledHighHum" => Some(ConditionKind::HighHumidity),
            "water-leak" | "ledWaterLeak" => Some(ConditionKind::WaterLeak),
            _ => None,
        }
    }

    /// The canonical identifier.
    pub fn id(&self) -> &'static str {
        match self {
            ConditionKind::HighTemperature => "high-temperature",
            ConditionKind::LowTemperature => "low-temperature",
            ConditionKind::HighHumidity => "high-humidity",
            ConditionKind::WaterLeak => "water-leak",
        }
    }

    /// The alert reason shown in notifications.
    pub fn reason(&self) -> &'static str {
        match self {
            ConditionKind::HighTemperature => "high temperature",
            ConditionKind::LowTemperature => "low temperature",
            ConditionKind::HighHumidity => "high humidity",
            ConditionKind::WaterLeak => "water leak detected",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returns the alert reason for `condition_id`, or `None` when the identifier
/// does not raise an alert.
pub fn classify(condition_id: &str) -> Option<&'static str> {
    ConditionKind::from_id(condition_id).map(|kind| kind.reason())
}
