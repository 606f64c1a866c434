//! Owner contact profile.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Contact information for the owner of a device.
///
/// Every field is optional; missing fields are rendered with a placeholder
/// when a notification is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Recipient {
    /// Owner's display name.
    pub name: Option<String>,
    /// Where the device is installed.
    pub physical_address: Option<String>,
    /// Postal address of the owner.
    pub mailing_address: Option<String>,
    /// Owner's phone number.
    pub phone_number: Option<String>,
    /// Name of the emergency contact.
    pub emergency_contact: Option<String>,
    /// Phone number of the emergency contact.
    pub emergency_phone: Option<String>,
    /// Email of the emergency contact.
    pub emergency_email: Option<String>,
}

impl Recipient {
    /// A profile with every field blank, used when the owner's profile could
    /// not be resolved.
    pub fn unknown() -> Self {
        Self::default()
    }
}
