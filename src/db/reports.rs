//! Report task registry: seed, claim, reconcile, reset.
//!
//! Every mutation writes `updated_at` itself; callers never supply
//! timestamps. Claiming is a single UPDATE-with-subselect-RETURNING
//! statement, so two concurrent claimers can never receive the same row.

use crate::error::DatabaseError;
use crate::types::{FailureKind, ReportFigures, ReportKey, StatusCounts, TaskStatus};
use crate::{Error, Result};

use super::{Database, TaskRecord};

/// Column list shared by queries that return full task records
const TASK_COLUMNS: &str = "id, county, municipality, year, status, \
     police_expenditure, total_expenditure, export_url, error_message, updated_at";

impl Database {
    /// Insert a NOT_ATTEMPTED row for `key` if none exists
    ///
    /// A no-op when the key is already present, whatever its status —
    /// seeding is idempotent and never disturbs earlier results.
    pub async fn upsert_if_absent(&self, key: &ReportKey) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO reports (county, municipality, year, status, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(county, municipality, year) DO NOTHING
            "#,
        )
        .bind(&key.county)
        .bind(&key.municipality)
        .bind(key.year)
        .bind(TaskStatus::NotAttempted.to_i32())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to seed report {}: {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Atomically claim the next eligible report, if any
    ///
    /// Eligible rows are NOT_ATTEMPTED, or RETRIEVAL_FAILED with
    /// `updated_at` older than `retry_before` (Unix milliseconds) — the
    /// pool passes its start time, so a failure recorded during the current
    /// run is not handed out
    /// again until a later run. Rows are claimed in (county, municipality,
    /// year) order. The selected row's status becomes IN_PROCESS and the
    /// row is returned in the same statement.
    pub async fn claim_next(&self, retry_before: i64) -> Result<Option<TaskRecord>> {
        let now = chrono::Utc::now().timestamp_millis();

        let row = sqlx::query_as::<_, TaskRecord>(&format!(
            r#"
            UPDATE reports
            SET status = ?, updated_at = ?
            WHERE id = (
                SELECT id FROM reports
                WHERE status = ? OR (status = ? AND updated_at < ?)
                ORDER BY county, municipality, year
                LIMIT 1
            )
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(TaskStatus::InProcess.to_i32())
        .bind(now)
        .bind(TaskStatus::NotAttempted.to_i32())
        .bind(TaskStatus::RetrievalFailed.to_i32())
        .bind(retry_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim next report: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Record a successful retrieval
    ///
    /// Sets RETRIEVED, stores the figures and the resolved export locator,
    /// and clears any earlier failure message.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::NotFound`] when no row exists for `key`.
    pub async fn record_success(
        &self,
        key: &ReportKey,
        figures: &ReportFigures,
        export_url: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, police_expenditure = ?, total_expenditure = ?,
                export_url = ?, error_message = NULL, updated_at = ?
            WHERE county = ? AND municipality = ? AND year = ?
            "#,
        )
        .bind(TaskStatus::Retrieved.to_i32())
        .bind(figures.police_expenditure)
        .bind(figures.total_expenditure)
        .bind(export_url)
        .bind(now)
        .bind(&key.county)
        .bind(&key.municipality)
        .bind(key.year)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record success for {}: {}",
                key, e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(key.to_string())));
        }

        Ok(())
    }

    /// Record a non-success terminal outcome for `key`
    ///
    /// [`FailureKind::Failed`] leaves the row claimable by a later run;
    /// [`FailureKind::Unavailable`] is terminal. The optional message is
    /// stored for diagnosis.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::NotFound`] when no row exists for `key`.
    pub async fn record_failure(
        &self,
        key: &ReportKey,
        kind: FailureKind,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, error_message = ?, updated_at = ?
            WHERE county = ? AND municipality = ? AND year = ?
            "#,
        )
        .bind(kind.status().to_i32())
        .bind(error_message)
        .bind(now)
        .bind(&key.county)
        .bind(&key.municipality)
        .bind(key.year)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to record failure for {}: {}",
                key, e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(key.to_string())));
        }

        Ok(())
    }

    /// Return every non-terminal row to NOT_ATTEMPTED
    ///
    /// Converts leftover IN_PROCESS rows from a crashed run (and any
    /// RETRIEVAL_FAILED rows) back into claimable work. RETRIEVED and
    /// UNAVAILABLE rows are never touched. Returns the number of rows reset.
    pub async fn reset_incomplete(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = ?, updated_at = ?
            WHERE status NOT IN (?, ?)
            "#,
        )
        .bind(TaskStatus::NotAttempted.to_i32())
        .bind(now)
        .bind(TaskStatus::Retrieved.to_i32())
        .bind(TaskStatus::Unavailable.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to reset incomplete reports: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Delete every claimable row, forcing re-enumeration
    ///
    /// Removes NOT_ATTEMPTED and RETRIEVAL_FAILED rows only; terminal rows
    /// survive. Returns the number of rows deleted.
    pub async fn drop_incomplete(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM reports WHERE status IN (?, ?)")
            .bind(TaskStatus::NotAttempted.to_i32())
            .bind(TaskStatus::RetrievalFailed.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to drop incomplete reports: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }

    /// Get a report row by key
    pub async fn get_report(&self, key: &ReportKey) -> Result<Option<TaskRecord>> {
        let row = sqlx::query_as::<_, TaskRecord>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM reports
            WHERE county = ? AND municipality = ? AND year = ?
            "#
        ))
        .bind(&key.county)
        .bind(&key.municipality)
        .bind(key.year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get report {}: {}",
                key, e
            )))
        })?;

        Ok(row)
    }

    /// List every retrieved report, in key order
    pub async fn list_retrieved(&self) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query_as::<_, TaskRecord>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM reports
            WHERE status = ?
            ORDER BY county, municipality, year
            "#
        ))
        .bind(TaskStatus::Retrieved.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list retrieved reports: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Per-status row counts across the whole registry
    pub async fn status_counts(&self) -> Result<StatusCounts> {
        let rows: Vec<(i32, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM reports GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count reports by status: {}",
                        e
                    )))
                })?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let count = count as u64;
            match TaskStatus::from_i32(status) {
                TaskStatus::NotAttempted => counts.not_attempted += count,
                TaskStatus::InProcess => counts.in_process += count,
                TaskStatus::Retrieved => counts.retrieved += count,
                TaskStatus::RetrievalFailed => counts.retrieval_failed += count,
                TaskStatus::Unavailable => counts.unavailable += count,
            }
        }

        Ok(counts)
    }
}
