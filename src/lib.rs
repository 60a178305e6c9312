//! # afr-harvest
//!
//! Resilient, resumable harvester for municipal annual financial reports.
//!
//! The report source is a slow, stateful, form-driven website: three
//! cascading drop-downs (county, municipality, year), a render trigger, and
//! a spreadsheet export. Pulling every report takes many hours and any
//! single attempt can fail transiently, so the harvester is built around a
//! persistent task registry: every (county, municipality, year) combination
//! is a durable row with a status, a fixed pool of workers claims rows
//! atomically, and every outcome is written back before the next claim. A
//! crashed or interrupted run resumes exactly where it stopped.
//!
//! ## Design Philosophy
//!
//! - **Registry is truth** - scheduling state lives in SQLite, never in memory
//! - **Nothing shared but the registry** - each worker owns its session and
//!   download directory
//! - **Failures are data** - a failed task is a row to retry later, never a
//!   crashed pool
//! - **Library-first** - browser automation and spreadsheet decoding plug in
//!   through traits; no CLI or UI
//!
//! ## Quick Start
//!
//! ```no_run
//! use afr_harvest::{Config, Harvester};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     connector: Arc<dyn afr_harvest::driver::DriverConnector>,
//! #     reader: Arc<dyn afr_harvest::parser::ArtifactReader>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let harvester = Harvester::new(config, connector, reader).await?;
//!
//! harvester.prepare().await?; // enumerate and seed the task space
//! let summary = harvester.run().await?; // drive the worker pool to exhaustion
//! println!(
//!     "retrieved {} of {} reports",
//!     summary.counts.retrieved,
//!     summary.counts.total()
//! );
//!
//! harvester.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Extraction-driver boundary
pub mod driver;
/// Task enumeration and registry seeding
pub mod enumerator;
/// Error types
pub mod error;
/// Top-level harvest facade
pub mod harvester;
/// Artifact-parser boundary and figure specs
pub mod parser;
/// Worker pool orchestration
pub mod pool;
/// Run progress tracking
pub mod progress;
/// Retry executor for transient failures
pub mod retry;
/// Core types
pub mod types;
/// Filesystem helpers
pub mod utils;

mod worker;

// Re-export commonly used types
pub use config::{ArtifactStrategy, Config, HarvestConfig, RetryPolicy, SourceConfig};
pub use db::{Database, MunicipalityRow, TaskRecord};
pub use driver::{DriverConnector, ReportDriver, SelectField, SessionSpec};
pub use enumerator::TaskEnumerator;
pub use error::{DatabaseError, DriverError, Error, HarvestError, ParseError, Result};
pub use harvester::Harvester;
pub use parser::{ArtifactReader, FigureSpec, LabelMatch, LabeledValueLookup, ReportVariant};
pub use pool::WorkerPool;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use types::{
    FailureKind, ReportFigures, ReportKey, RunSummary, SeedSummary, StatusCounts, TaskStatus,
};
