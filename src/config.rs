//! Configuration types for afr-harvest

use crate::parser::ReportVariant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Top-level configuration
///
/// Works out of the box against the defaults below; every behavior can be
/// overridden field by field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// External report source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Worker-pool and download behavior
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Option-hierarchy enumeration behavior
    #[serde(default)]
    pub enumeration: EnumerationConfig,

    /// Which figures to read out of a retrieved artifact
    #[serde(default)]
    pub parser: ParserConfig,

    /// Registry persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry policy for selection-field interactions
    #[serde(default = "default_selection_retry")]
    pub selection_retry: RetryPolicy,

    /// Retry policy for the export request
    #[serde(default = "default_export_retry")]
    pub export_retry: RetryPolicy,
}

impl Config {
    /// Validate settings that cannot be expressed through the type system
    pub fn validate(&self) -> crate::Result<()> {
        if self.harvest.pool_size == 0 {
            return Err(crate::Error::Config {
                message: "worker pool size must be at least 1".to_string(),
                key: Some("harvest.pool_size".to_string()),
            });
        }
        if self.harvest.session_init_attempts == 0 {
            return Err(crate::Error::Config {
                message: "session initialization needs at least one attempt".to_string(),
                key: Some("harvest.session_init_attempts".to_string()),
            });
        }
        Ok(())
    }
}

/// External report source settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Entry URL of the report form
    #[serde(default = "default_source_url")]
    pub url: Url,

    /// Option value the form uses for "no selection" (skipped during enumeration)
    #[serde(default = "default_sentinel_option")]
    pub sentinel_option: String,

    /// Label shown when a field has no real selection (skipped during enumeration)
    #[serde(default = "default_no_selection_label")]
    pub no_selection_label: String,

    /// Message fragments that mark a driver error as transient
    ///
    /// Matched by substring against the error's display text.
    #[serde(default = "default_retryable_messages")]
    pub retryable_messages: Vec<String>,

    /// Bound on waiting for the render trigger to return to its ready state
    #[serde(default = "default_render_timeout", with = "duration_serde")]
    pub render_timeout: Duration,

    /// How the exported artifact is obtained
    #[serde(default)]
    pub artifact_strategy: ArtifactStrategy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            sentinel_option: default_sentinel_option(),
            no_selection_label: default_no_selection_label(),
            retryable_messages: default_retryable_messages(),
            render_timeout: default_render_timeout(),
            artifact_strategy: ArtifactStrategy::default(),
        }
    }
}

/// How a worker obtains the exported artifact
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStrategy {
    /// Trigger the export and poll the download directory for a size-stable file
    #[default]
    ExportAndPoll,
    /// Read the resolved export URL from the driver and fetch it over HTTP
    DirectUrl,
}

/// Worker-pool and download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Number of concurrent workers (default: 4)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Root directory for per-worker download areas (default: "./outputs")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Attempts to establish one worker's driver session before the slot fails
    #[serde(default = "default_session_init_attempts")]
    pub session_init_attempts: u32,

    /// Abort the whole run if any worker slot fails to come up
    ///
    /// When false, a dead slot is logged and the run continues with fewer
    /// workers. A run with zero live workers aborts regardless.
    #[serde(default)]
    pub fail_fast_on_worker_init: bool,

    /// Interval between polls of the download directory
    #[serde(default = "default_download_poll_interval", with = "duration_serde")]
    pub download_poll_interval: Duration,

    /// Bound on waiting for the exported file to appear and stabilize
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,

    /// File extension the export produces (default: "xlsx")
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    /// Interval between progress-report log lines
    #[serde(default = "default_progress_interval", with = "duration_serde")]
    pub progress_interval: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            output_dir: default_output_dir(),
            session_init_attempts: default_session_init_attempts(),
            fail_fast_on_worker_init: false,
            download_poll_interval: default_download_poll_interval(),
            download_timeout: default_download_timeout(),
            artifact_extension: default_artifact_extension(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Option-hierarchy enumeration behavior
///
/// Selecting a parent option changes the child option list server-side, so
/// the enumerator re-polls the child list until it reads the same sequence
/// `stable_polls` times in a row, giving up after `max_polls` polls and
/// using the last sequence it saw.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Interval between option-list polls
    #[serde(default = "default_enumeration_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Consecutive identical reads required to treat a list as stabilized
    #[serde(default = "default_stable_polls")]
    pub stable_polls: u32,

    /// Upper bound on polls before the list is treated as stabilized anyway
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_enumeration_poll_interval(),
            stable_polls: default_stable_polls(),
            max_polls: default_max_polls(),
        }
    }
}

/// Which figures to read out of a retrieved artifact
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Report layout variant selecting the figure lookup specs
    #[serde(default)]
    pub variant: ReportVariant,
}

/// Registry persistence settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path (default: "./harvest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Retry policy for one call site
///
/// The delay before retry number `n` is `backoff_base * n`, capped at
/// `max_delay`, with optional jitter. `max_attempts` counts every attempt,
/// including the first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 4)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay unit between attempts (default: 1 second)
    #[serde(default = "default_backoff_base", with = "duration_serde")]
    pub backoff_base: Duration,

    /// Cap on any single delay (default: 30 seconds)
    #[serde(default = "default_max_backoff", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
            max_delay: default_max_backoff(),
            jitter: true,
        }
    }
}

// Default value functions for serde

#[allow(clippy::expect_used)]
fn default_source_url() -> Url {
    Url::parse("https://munstats.pa.gov/Reports/ReportInformation2.aspx?report=mAfrForm")
        .expect("default source URL parses")
}

fn default_sentinel_option() -> String {
    "-1".to_string()
}

fn default_no_selection_label() -> String {
    "[Select a Value]".to_string()
}

fn default_retryable_messages() -> Vec<String> {
    vec![
        "The report or page is being updated".to_string(),
        "Node is detached from document".to_string(),
    ]
}

fn default_render_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_pool_size() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_session_init_attempts() -> u32 {
    3
}

fn default_download_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_artifact_extension() -> String {
    "xlsx".to_string()
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_enumeration_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_stable_polls() -> u32 {
    2
}

fn default_max_polls() -> u32 {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./harvest.db")
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_base() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_selection_retry() -> RetryPolicy {
    RetryPolicy::default()
}

fn default_export_retry() -> RetryPolicy {
    RetryPolicy::default()
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
