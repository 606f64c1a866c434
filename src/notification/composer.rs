//! Assembles the subject and body of an alert notification.

use serde_json::{Value, json};

use super::{error::NotificationError, template::TemplateService};
use crate::models::{ConditionKey, NotificationMessage, Recipient, RenderedMessage};

/// Rendered in place of any contact field the owner left empty.
pub const BLANK_PLACEHOLDER: &str = "Blank";

/// Renders [`NotificationMessage`] templates against an alert and the owner's
/// contact profile.
pub struct MessageComposer {
    templates: NotificationMessage,
    template_service: TemplateService,
}

impl MessageComposer {
    /// Creates a composer and checks both templates render against a sample
    /// alert, so a broken template fails at startup instead of at alert time.
    pub fn new(templates: NotificationMessage) -> Result<Self, NotificationError> {
        let composer = Self { templates, template_service: TemplateService::new() };
        let sample = ConditionKey::new("D0", "high-temperature");
        composer.compose("high temperature", &sample, &Recipient::unknown())?;
        Ok(composer)
    }

    /// Renders the message for `reason` on `key`.
    pub fn compose(
        &self,
        reason: &str,
        key: &ConditionKey,
        recipient: &Recipient,
    ) -> Result<RenderedMessage, NotificationError> {
        let context = Self::context(reason, key, recipient);
        let subject = self.template_service.render(&self.templates.title, context.clone())?;
        let body = self.template_service.render(&self.templates.body, context)?;
        Ok(RenderedMessage { subject, body })
    }

    fn context(reason: &str, key: &ConditionKey, recipient: &Recipient) -> Value {
        let field = |value: &Option<String>| -> String {
            match value.as_deref() {
                Some(v) if !v.trim().is_empty() => v.to_string(),
                _ => BLANK_PLACEHOLDER.to_string(),
            }
        };

        json!({
            "reason": reason,
            "device_id": key.device_id,
            "condition_id": key.condition_id,
            "recipient": {
                "name": field(&recipient.name),
                "physical_address": field(&recipient.physical_address),
                "mailing_address": field(&recipient.mailing_address),
                "phone_number": field(&recipient.phone_number),
                "emergency_contact": field(&recipient.emergency_contact),
                "emergency_phone": field(&recipient.emergency_phone),
                "emergency_email": field(&recipient.emergency_email),
            }
        })
    }
}
