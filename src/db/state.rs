//! Runtime state tracking: shutdown detection, enumeration bookkeeping.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Check if the last shutdown was unclean
    ///
    /// Returns true if the previous session did not call
    /// `set_clean_shutdown()`, indicating a crash or forced termination.
    /// Called on startup to decide whether leftover IN_PROCESS rows need
    /// resetting before workers start claiming.
    pub async fn was_unclean_shutdown(&self) -> Result<bool> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = 'clean_shutdown'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check shutdown state: {}",
                e
            )))
        })?;

        // If the value is missing or "false", it was an unclean shutdown
        Ok(value.is_none_or(|v| v != "true"))
    }

    /// Mark that the application has started cleanly
    ///
    /// If `set_clean_shutdown()` is not called before the next startup,
    /// `was_unclean_shutdown()` will return true.
    pub async fn set_clean_start(&self) -> Result<()> {
        self.put_state("clean_shutdown", "false").await
    }

    /// Mark that the application is shutting down cleanly
    pub async fn set_clean_shutdown(&self) -> Result<()> {
        self.put_state("clean_shutdown", "true").await
    }

    /// Record the completion time of an enumeration pass
    pub async fn set_last_enumeration(&self, timestamp: i64) -> Result<()> {
        self.put_state("last_enumeration", &timestamp.to_string())
            .await
    }

    /// Unix timestamp of the last completed enumeration pass, if any
    pub async fn last_enumeration(&self) -> Result<Option<i64>> {
        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = 'last_enumeration'
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read last enumeration time: {}",
                e
            )))
        })?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    /// Upsert one runtime_state key
    async fn put_state(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state key {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }
}
