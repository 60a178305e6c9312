//! Error types for afr-harvest
//!
//! A single top-level [`Error`] with nested domain enums. Driver and parser
//! errors carry human-readable messages because the retry classifier inspects
//! them by substring against the configured retryable vocabulary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::driver::SelectField;

/// Result type alias for afr-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for afr-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "harvest.pool_size")
        key: Option<String>,
    },

    /// Registry/database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Error reported by the extraction driver
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Error from the artifact parser
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error in the harvest pipeline between export and persistence
    #[error("harvest error: {0}")]
    Harvest(#[from] HarvestError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error while fetching a resolved export URL
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by an extraction-driver implementation
///
/// `SessionFailed` is startup-fatal for the worker slot; the remaining
/// variants are task-level. `Busy` is the message-carrying transient
/// condition the retry classifier matches against.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Could not establish an isolated driver session
    #[error("failed to establish source session: {0}")]
    SessionFailed(String),

    /// A required option value is missing from a selection field
    #[error("option \"{value}\" not found for {field} field")]
    OptionNotFound {
        /// The selection field that was searched
        field: SelectField,
        /// The option value that could not be located
        value: String,
    },

    /// The render trigger did not return to its ready state in time
    #[error("report did not render within {timeout:?}")]
    RenderTimeout {
        /// The bound that was exceeded
        timeout: Duration,
    },

    /// Transient condition reported by the source page
    #[error("{0}")]
    Busy(String),

    /// Any other driver failure
    #[error("{0}")]
    Other(String),
}

/// Errors from reading figures out of a downloaded artifact
#[derive(Debug, Error)]
pub enum ParseError {
    /// The artifact could not be opened at all
    #[error("failed to open artifact {path}: {reason}")]
    LoadFailed {
        /// Path of the artifact that failed to open
        path: PathBuf,
        /// Why it failed to open
        reason: String,
    },

    /// The artifact opened but its structure is broken
    #[error("artifact {path} is malformed: {reason}")]
    Malformed {
        /// Path of the malformed artifact
        path: PathBuf,
        /// Description of the structural problem
        reason: String,
    },

    /// The sheet a figure spec points at does not exist
    #[error("sheet \"{sheet}\" missing from artifact")]
    SheetMissing {
        /// The sheet identifier that was requested
        sheet: String,
    },
}

/// Pipeline errors between requesting the export and persisting the result
#[derive(Debug, Error)]
pub enum HarvestError {
    /// No stable export file appeared in the worker's download directory
    #[error("no stable export file appeared in {dir} within {waited:?}")]
    ExportTimeout {
        /// The download directory that was polled
        dir: PathBuf,
        /// How long the worker waited
        waited: Duration,
    },

    /// The direct-URL strategy was selected but the driver exposed no locator
    #[error("source exposed no resolved export locator")]
    MissingExportUrl,

    /// The direct-URL fetch returned a non-success HTTP status
    #[error("export fetch returned HTTP {status}")]
    FetchFailed {
        /// The HTTP status code returned by the source
        status: u16,
    },
}
