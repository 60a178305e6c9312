//! Database layer for afr-harvest
//!
//! Handles SQLite persistence for the report registry, auxiliary
//! municipality metadata, and runtime state. The registry is the single
//! source of truth for task scheduling; all access goes through the atomic
//! operations defined here and no caller ever reads-then-writes a row as
//! two separate calls.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`reports`] — Report task registry (seed, claim, reconcile, reset)
//! - [`municipalities`] — Auxiliary municipality metadata
//! - [`state`] — Runtime state (shutdown tracking, enumeration timestamps)

use crate::types::{ReportKey, TaskStatus};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod municipalities;
mod reports;
mod state;

/// Report task record from database
///
/// `status` is the raw integer code; use [`TaskRecord::status`] for the
/// typed view. `updated_at` is maintained by the store itself on every
/// mutation.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRecord {
    /// Unique database ID
    pub id: i64,
    /// County the municipality belongs to
    pub county: String,
    /// Municipality the report covers
    pub municipality: String,
    /// Reporting year
    pub year: i64,
    /// Current status code (see [`TaskStatus`])
    pub status: i32,
    /// Police expenditures, set on retrieval
    pub police_expenditure: Option<f64>,
    /// Total expenditures, set on retrieval
    pub total_expenditure: Option<f64>,
    /// Resolved export locator, when the source exposed one
    pub export_url: Option<String>,
    /// Last failure message, cleared on success
    pub error_message: Option<String>,
    /// Unix timestamp in milliseconds of the last mutation (written by the store)
    pub updated_at: i64,
}

impl TaskRecord {
    /// The (county, municipality, year) key of this record
    pub fn key(&self) -> ReportKey {
        ReportKey::new(self.county.clone(), self.municipality.clone(), self.year)
    }

    /// Typed view of the status code
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_i32(self.status)
    }
}

/// Municipality metadata record from the auxiliary table
///
/// Enrichment data only; scheduling never consults it.
#[derive(Debug, Clone, FromRow)]
pub struct MunicipalityRow {
    /// Unique database ID
    pub id: i64,
    /// County the municipality belongs to
    pub county: String,
    /// Municipality name
    pub name: String,
    /// Unix timestamp when the municipality was first discovered
    pub first_seen: i64,
}

/// Database handle for afr-harvest
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
