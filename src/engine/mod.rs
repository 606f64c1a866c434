//! The alert engine: classification, notification decisions and reminder
//! scheduling.

pub mod alert_engine;
pub mod classifier;
pub mod clock;
pub mod reminder;

pub use alert_engine::{AlertEngine, AlertEngineError};
pub use classifier::{ConditionKind, classify};
pub use clock::{Clock, SystemClock};
pub use reminder::{NotifyOutcome, ReconcileSummary, ReminderScheduler};
