//! Core types for afr-harvest

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for one report: the (county, municipality, year) triple
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportKey {
    /// County the municipality belongs to
    pub county: String,
    /// Municipality the report covers
    pub municipality: String,
    /// Reporting year
    pub year: i64,
}

impl ReportKey {
    /// Create a new report key
    pub fn new(county: impl Into<String>, municipality: impl Into<String>, year: i64) -> Self {
        Self {
            county: county.into(),
            municipality: municipality.into(),
            year,
        }
    }
}

impl std::fmt::Display for ReportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.county, self.municipality, self.year)
    }
}

/// Lifecycle status of one report task
///
/// `Retrieved` and `Unavailable` are terminal; `NotAttempted` and
/// `RetrievalFailed` are claimable; `InProcess` is held by exactly one
/// worker at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Seeded but never claimed
    NotAttempted,
    /// Claimed by a worker and currently being extracted
    InProcess,
    /// Figures extracted and persisted
    Retrieved,
    /// Extraction failed; eligible for a later retry
    RetrievalFailed,
    /// The source explicitly reported the report as unavailable
    Unavailable,
}

impl TaskStatus {
    /// Convert integer status code to TaskStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => TaskStatus::NotAttempted,
            1 => TaskStatus::InProcess,
            2 => TaskStatus::Retrieved,
            3 => TaskStatus::RetrievalFailed,
            4 => TaskStatus::Unavailable,
            _ => TaskStatus::RetrievalFailed, // Default to RetrievalFailed for unknown status
        }
    }

    /// Convert TaskStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            TaskStatus::NotAttempted => 0,
            TaskStatus::InProcess => 1,
            TaskStatus::Retrieved => 2,
            TaskStatus::RetrievalFailed => 3,
            TaskStatus::Unavailable => 4,
        }
    }

    /// Whether the status is terminal (never re-claimed without an explicit reset)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Retrieved | TaskStatus::Unavailable)
    }
}

/// How a task ended when it did not end in `Retrieved`
///
/// Restricting failure recording to these two outcomes keeps the registry
/// from ever being handed an in-flight or success status through the
/// failure path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Extraction failed; the task stays claimable for a later run
    Failed,
    /// The source reported the report as unavailable; terminal, not an error
    Unavailable,
}

impl FailureKind {
    /// The registry status this failure maps to
    pub fn status(&self) -> TaskStatus {
        match self {
            FailureKind::Failed => TaskStatus::RetrievalFailed,
            FailureKind::Unavailable => TaskStatus::Unavailable,
        }
    }
}

/// The figures pulled out of one retrieved report
///
/// A missing label in the sheet is tolerated as `None`; a row is still
/// `Retrieved` as long as the artifact itself parsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFigures {
    /// Police expenditures for the year
    pub police_expenditure: Option<f64>,
    /// Total expenditures for the year
    pub total_expenditure: Option<f64>,
}

/// Per-status row counts for the whole registry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Rows never attempted
    pub not_attempted: u64,
    /// Rows currently claimed
    pub in_process: u64,
    /// Rows successfully retrieved
    pub retrieved: u64,
    /// Rows whose last attempt failed
    pub retrieval_failed: u64,
    /// Rows the source reported as unavailable
    pub unavailable: u64,
}

impl StatusCounts {
    /// Total number of rows in the registry
    pub fn total(&self) -> u64 {
        self.not_attempted
            + self.in_process
            + self.retrieved
            + self.retrieval_failed
            + self.unavailable
    }

    /// Rows a worker could still claim
    pub fn claimable(&self) -> u64 {
        self.not_attempted + self.retrieval_failed
    }
}

/// Outcome of one full worker-pool run
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Registry counts after the run
    pub counts: StatusCounts,
    /// Tasks processed during this run (any outcome)
    pub processed: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Worker slots that established a session and ran
    pub workers_started: usize,
    /// Worker slots that never came up
    pub workers_failed: usize,
}

impl RunSummary {
    /// Average tasks processed per minute over the run
    pub fn per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.processed as f64 / minutes
        } else {
            0.0
        }
    }
}

/// Outcome of one enumeration pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Leaf (county, municipality, year) combinations visited
    pub discovered: u64,
    /// Municipalities recorded in the auxiliary table
    pub municipalities: u64,
}
