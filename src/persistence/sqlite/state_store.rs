//! Implementation of the StateStore and DeviceRepository traits for
//! SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    models::{ConditionKey, ConditionState, FlagChange, Recipient},
    persistence::{
        error::PersistenceError,
        sqlite::SqliteStateRepository,
        traits::{DeviceRepository, StateStore},
    },
};

#[async_trait]
impl StateStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_condition_state(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<ConditionState, PersistenceError> {
        let row: Option<(bool, Option<DateTime<Utc>>)> = self
            .execute_query_with_error_handling(
                "get condition state",
                sqlx::query_as(
                    "SELECT active, last_notified_at FROM device_conditions WHERE device_id = ? \
                     AND condition_id = ?",
                )
                .bind(device_id)
                .bind(condition_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row
            .map(|(active, last_notified_at)| ConditionState { active, last_notified_at })
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_flag(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<Option<bool>, PersistenceError> {
        let row: Option<(bool,)> = self
            .execute_query_with_error_handling(
                "get flag",
                sqlx::query_as(
                    "SELECT active FROM device_conditions WHERE device_id = ? AND condition_id = ?",
                )
                .bind(device_id)
                .bind(condition_id)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|(active,)| active))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn set_last_notified(
        &self,
        device_id: &str,
        condition_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "set last notified",
                sqlx::query(
                    "UPDATE device_conditions SET last_notified_at = ? WHERE device_id = ? AND \
                     condition_id = ? AND active = 1",
                )
                .bind(at)
                .bind(device_id)
                .bind(condition_id)
                .execute(&self.pool),
            )
            .await?;

        let applied = result.rows_affected() > 0;
        if !applied {
            tracing::debug!(
                device_id,
                condition_id,
                "Condition is not active; last-notified timestamp not recorded."
            );
        }
        Ok(applied)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn clear_condition(
        &self,
        device_id: &str,
        condition_id: &str,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "clear condition",
                sqlx::query(
                    "UPDATE device_conditions SET last_notified_at = NULL WHERE device_id = ? \
                     AND condition_id = ? AND active = 0",
                )
                .bind(device_id)
                .bind(condition_id)
                .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Either the pair was never written or it is active again.
        let cleared = self.get_flag(device_id, condition_id).await? != Some(true);
        if !cleared {
            tracing::debug!(
                device_id,
                condition_id,
                "Condition is active again; last-notified timestamp kept."
            );
        }
        Ok(cleared)
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_owner(&self, device_id: &str) -> Result<Option<String>, PersistenceError> {
        let row: Option<(Option<String>,)> = self
            .execute_query_with_error_handling(
                "get owner",
                sqlx::query_as("SELECT owner_id FROM devices WHERE device_id = ?")
                    .bind(device_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.and_then(|(owner_id,)| owner_id).filter(|owner| !owner.is_empty()))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
    ) -> Result<Option<Recipient>, PersistenceError> {
        self.execute_query_with_error_handling(
            "get recipient",
            sqlx::query_as::<_, Recipient>(
                "SELECT name, physical_address, mailing_address, phone_number, \
                 emergency_contact, emergency_phone, emergency_email FROM contacts WHERE \
                 owner_id = ? AND device_id = ?",
            )
            .bind(owner_id)
            .bind(device_id)
            .fetch_optional(&self.pool),
        )
        .await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_active_conditions(
        &self,
    ) -> Result<Vec<(ConditionKey, ConditionState)>, PersistenceError> {
        let rows: Vec<(String, String, Option<DateTime<Utc>>)> = self
            .execute_query_with_error_handling(
                "list active conditions",
                sqlx::query_as(
                    "SELECT device_id, condition_id, last_notified_at FROM device_conditions \
                     WHERE active = 1 ORDER BY device_id, condition_id",
                )
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|(device_id, condition_id, last_notified_at)| {
                (
                    ConditionKey { device_id, condition_id },
                    ConditionState { active: true, last_notified_at },
                )
            })
            .collect())
    }

    /// Writes pending WAL frames back into the main database file.
    #[tracing::instrument(skip(self), level = "info")]
    async fn flush(&self) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "WAL checkpoint",
            sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)").execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "info")]
    async fn close(&self) {
        tracing::debug!("Closing SQLite connection pool.");
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed successfully.");
    }
}

#[async_trait]
impl DeviceRepository for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn write_flag(
        &self,
        device_id: &str,
        condition_id: &str,
        active: bool,
    ) -> Result<FlagChange, PersistenceError> {
        let mut tx = self
            .execute_query_with_error_handling("begin flag write", self.pool.begin())
            .await?;

        let previous: Option<(bool,)> = self
            .execute_query_with_error_handling(
                "read previous flag",
                sqlx::query_as(
                    "SELECT active FROM device_conditions WHERE device_id = ? AND condition_id = ?",
                )
                .bind(device_id)
                .bind(condition_id)
                .fetch_optional(&mut *tx),
            )
            .await?;

        self.execute_query_with_error_handling(
            "register device",
            sqlx::query("INSERT OR IGNORE INTO devices (device_id) VALUES (?)")
                .bind(device_id)
                .execute(&mut *tx),
        )
        .await?;

        // Deactivation drops the debounce timestamp in the same statement.
        self.execute_query_with_error_handling(
            "write flag",
            sqlx::query(
                "INSERT INTO device_conditions (device_id, condition_id, active, updated_at) \
                 VALUES (?, ?, ?, CURRENT_TIMESTAMP) ON CONFLICT(device_id, condition_id) DO \
                 UPDATE SET active = excluded.active, updated_at = excluded.updated_at, \
                 last_notified_at = CASE WHEN excluded.active = 1 THEN \
                 device_conditions.last_notified_at ELSE NULL END",
            )
            .bind(device_id)
            .bind(condition_id)
            .bind(active)
            .execute(&mut *tx),
        )
        .await?;

        self.execute_query_with_error_handling("commit flag write", tx.commit()).await?;

        Ok(FlagChange::new(device_id, condition_id, previous.map(|(p,)| p), Some(active)))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn set_owner(
        &self,
        device_id: &str,
        owner_id: Option<&str>,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "set owner",
            sqlx::query(
                "INSERT INTO devices (device_id, owner_id) VALUES (?, ?) ON CONFLICT(device_id) \
                 DO UPDATE SET owner_id = excluded.owner_id",
            )
            .bind(device_id)
            .bind(owner_id)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, recipient), level = "debug")]
    async fn set_recipient(
        &self,
        owner_id: &str,
        device_id: &str,
        recipient: &Recipient,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "set recipient",
            sqlx::query(
                "INSERT INTO contacts (owner_id, device_id, name, physical_address, \
                 mailing_address, phone_number, emergency_contact, emergency_phone, \
                 emergency_email) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) ON CONFLICT(owner_id, \
                 device_id) DO UPDATE SET name = excluded.name, physical_address = \
                 excluded.physical_address, mailing_address = excluded.mailing_address, \
                 phone_number = excluded.phone_number, emergency_contact = \
                 excluded.emergency_contact, emergency_phone = excluded.emergency_phone, \
                 emergency_email = excluded.emergency_email",
            )
            .bind(owner_id)
            .bind(device_id)
            .bind(&recipient.name)
            .bind(&recipient.physical_address)
            .bind(&recipient.mailing_address)
            .bind(&recipient.phone_number)
            .bind(&recipient.emergency_contact)
            .bind(&recipient.emergency_phone)
            .bind(&recipient.emergency_email)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
