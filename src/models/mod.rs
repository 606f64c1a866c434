//! This module contains the data models for the homewatch application.

pub mod condition;
pub mod notification;
pub mod notifier;
pub mod recipient;

pub use condition::{ConditionKey, ConditionState, FlagChange};
pub use notification::{NotificationMessage, RenderedMessage};
pub use recipient::Recipient;
