use async_trait::async_trait;

use super::{Notifier, error::NotificationError};

/// A notifier that prints each alert to standard output.
#[derive(Debug, Default)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        println!("=== To: {recipient_address} ===\n{subject}\n{body}\n");
        Ok(())
    }
}
