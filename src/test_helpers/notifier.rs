use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::notification::{NotificationError, Notifier};

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    /// Address passed to `send`.
    pub recipient_address: String,
    /// Rendered subject.
    pub subject: String,
    /// Rendered body.
    pub body: String,
}

/// A notifier that records every delivery attempt, optionally failing them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail (they are still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every attempt so far, in order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of attempts so far.
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(SentNotification {
            recipient_address: recipient_address.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::NotifyFailed("recording notifier set to fail".to_string()));
        }
        Ok(())
    }
}
