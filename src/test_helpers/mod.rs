//! A set of helpers for testing

mod alert_engine;
mod clock;
mod notifier;
mod state_store;

pub use alert_engine::{TEST_RECIPIENT_ADDRESS, create_test_alert_engine, create_test_sqlite_store};
pub use clock::{ManualClock, TokioClock};
pub use notifier::{RecordingNotifier, SentNotification};
pub use state_store::InMemoryStateStore;
