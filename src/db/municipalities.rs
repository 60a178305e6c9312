//! Auxiliary municipality metadata.
//!
//! Populated during enumeration, consumed for enrichment and reporting
//! only. The scheduler never reads this table.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, MunicipalityRow};

impl Database {
    /// Record a municipality if it has not been seen before
    pub async fn upsert_municipality(&self, county: &str, name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO municipalities (county, name, first_seen)
            VALUES (?, ?, ?)
            ON CONFLICT(county, name) DO NOTHING
            "#,
        )
        .bind(county)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to upsert municipality {}/{}: {}",
                county, name, e
            )))
        })?;

        Ok(())
    }

    /// List all known municipalities, grouped by county
    pub async fn list_municipalities(&self) -> Result<Vec<MunicipalityRow>> {
        let rows = sqlx::query_as::<_, MunicipalityRow>(
            r#"
            SELECT id, county, name, first_seen
            FROM municipalities
            ORDER BY county, name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list municipalities: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Number of known municipalities
    pub async fn municipality_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM municipalities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count municipalities: {}",
                    e
                )))
            })?;

        Ok(count as u64)
    }
}
