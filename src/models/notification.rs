//! Data models for notifications.

use serde::{Deserialize, Serialize};

/// Default subject template.
pub const DEFAULT_TITLE_TEMPLATE: &str = "Alert for Device {{ device_id }}";

/// Default body template, listing the alert and every contact field.
pub const DEFAULT_BODY_TEMPLATE: &str = "Alert: {{ reason }}
Device ID: {{ device_id }}
Condition: {{ condition_id }}
User Information:
- Name: {{ recipient.name }}
- Physical Address: {{ recipient.physical_address }}
- Mailing Address: {{ recipient.mailing_address }}
- Phone Number: {{ recipient.phone_number }}
- Emergency Contact: {{ recipient.emergency_contact }}
- Emergency Phone: {{ recipient.emergency_phone }}
- Emergency Email: {{ recipient.emergency_email }}";

/// A message template to be rendered for a notification, with a title and
/// body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationMessage {
    /// The title (subject) template.
    pub title: String,
    /// The body template.
    pub body: String,
}

impl Default for NotificationMessage {
    fn default() -> Self {
        Self { title: DEFAULT_TITLE_TEMPLATE.to_string(), body: DEFAULT_BODY_TEMPLATE.to_string() }
    }
}

/// A fully rendered notification, ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Rendered subject line.
    pub subject: String,
    /// Rendered body.
    pub body: String,
}
