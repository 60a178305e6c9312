//! Worker pool orchestration
//!
//! A fixed-size set of independent workers sharing nothing but the registry.
//! Sessions are established up front — failing to bring up a slot is the
//! only startup-fatal condition — then every live worker loops
//! claim → execute until the registry has nothing left, and the pool joins
//! them and reports totals. There is no rebalancing and no global
//! cancellation: claim exclusivity makes idle workers cheap, and the run
//! ends by natural exhaustion.

use std::sync::Arc;
use tokio::time::Instant;

use crate::config::Config;
use crate::db::Database;
use crate::driver::{DriverConnector, ReportDriver, SessionSpec};
use crate::error::{DriverError, Error, Result};
use crate::parser::ArtifactReader;
use crate::progress::ProgressTracker;
use crate::types::RunSummary;
use crate::utils::reset_dir;
use crate::worker::{Worker, WorkerContext};

/// Fixed-size pool of report workers
pub struct WorkerPool {
    db: Arc<Database>,
    config: Arc<Config>,
    connector: Arc<dyn DriverConnector>,
    reader: Arc<dyn ArtifactReader>,
}

impl WorkerPool {
    /// Create a pool over the given registry and collaborator boundaries
    pub fn new(
        db: Arc<Database>,
        config: Arc<Config>,
        connector: Arc<dyn DriverConnector>,
        reader: Arc<dyn ArtifactReader>,
    ) -> Self {
        Self {
            db,
            config,
            connector,
            reader,
        }
    }

    /// Drive the registry to exhaustion and report totals
    ///
    /// Prepares the registry (leftover IN_PROCESS and failed rows become
    /// claimable again) and the scratch directory, establishes one isolated
    /// session per slot, runs all live workers to completion, and cleans up.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, when every worker slot
    /// fails to initialize, or — with
    /// [`fail_fast_on_worker_init`](crate::config::HarvestConfig::fail_fast_on_worker_init)
    /// set — when any slot does.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let harvest = &self.config.harvest;
        let started = Instant::now();
        // Failures recorded from here on belong to this run and are not re-claimed
        let retry_horizon = chrono::Utc::now().timestamp_millis();

        let reset = self.db.reset_incomplete().await?;
        if reset > 0 {
            tracing::info!(rows = reset, "reset incomplete reports before run");
        }
        reset_dir(&harvest.output_dir).await?;

        // Establish all sessions before any claim: a dead slot is a startup
        // condition, not a task failure.
        let session_results = futures::future::join_all(
            (0..harvest.pool_size).map(|slot| self.establish_session(slot)),
        )
        .await;

        let mut drivers: Vec<(usize, Box<dyn ReportDriver>)> = Vec::new();
        let mut init_errors: Vec<Error> = Vec::new();
        for (slot, result) in session_results.into_iter().enumerate() {
            match result {
                Ok(driver) => drivers.push((slot, driver)),
                Err(e) => {
                    tracing::error!(worker = slot, error = %e, "worker slot failed to initialize");
                    init_errors.push(e);
                }
            }
        }

        let workers_failed = init_errors.len();
        if drivers.is_empty() {
            return Err(init_errors.pop().unwrap_or_else(|| {
                DriverError::SessionFailed("no worker slots configured".to_string()).into()
            }));
        }
        if harvest.fail_fast_on_worker_init && !init_errors.is_empty() {
            return Err(init_errors.remove(0));
        }

        let workers_started = drivers.len();
        let progress = ProgressTracker::new(harvest.pool_size);
        let reporter = progress.spawn_reporter(harvest.progress_interval);

        let mut handles = Vec::with_capacity(workers_started);
        for (slot, driver) in drivers {
            let worker = Worker::new(WorkerContext {
                slot,
                driver,
                reader: self.reader.clone(),
                db: self.db.clone(),
                config: self.config.clone(),
                download_dir: harvest.output_dir.join(format!("worker-{slot}")),
                progress: progress.clone(),
                retry_horizon,
            });
            handles.push(tokio::spawn(worker.run()));
        }

        let mut processed = 0u64;
        for handle in handles {
            match handle.await {
                Ok(count) => processed += count,
                Err(e) => tracing::error!(error = %e, "worker task aborted unexpectedly"),
            }
        }
        reporter.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&harvest.output_dir).await {
            tracing::warn!(
                dir = %harvest.output_dir.display(),
                error = %e,
                "failed to clean up scratch directory"
            );
        }

        let counts = self.db.status_counts().await?;
        let summary = RunSummary {
            counts,
            processed,
            elapsed: started.elapsed(),
            workers_started,
            workers_failed,
        };
        tracing::info!(
            processed = summary.processed,
            retrieved = counts.retrieved,
            failed = counts.retrieval_failed,
            unavailable = counts.unavailable,
            per_minute = format!("{:.1}", summary.per_minute()),
            "harvest run complete"
        );
        Ok(summary)
    }

    /// Open one slot's isolated session, retrying a bounded number of times
    async fn establish_session(&self, slot: usize) -> Result<Box<dyn ReportDriver>> {
        let harvest = &self.config.harvest;
        let download_dir = harvest.output_dir.join(format!("worker-{slot}"));
        tokio::fs::create_dir_all(&download_dir).await?;

        let spec = SessionSpec {
            name: format!("worker-{slot}"),
            url: self.config.source.url.clone(),
            download_dir,
        };
        connect_with_retries(self.connector.as_ref(), spec, harvest.session_init_attempts).await
    }
}

/// Connect a session, retrying up to `max_attempts` times
///
/// Session establishment is the one startup-fatal operation; exhausting the
/// attempts surfaces the last connector error.
pub(crate) async fn connect_with_retries(
    connector: &dyn DriverConnector,
    spec: SessionSpec,
    max_attempts: u32,
) -> Result<Box<dyn ReportDriver>> {
    let mut last_error: Option<Error> = None;
    for attempt in 1..=max_attempts.max(1) {
        match connector.connect(spec.clone()).await {
            Ok(driver) => {
                tracing::info!(session = %spec.name, attempt, "session established");
                return Ok(driver);
            }
            Err(e) => {
                tracing::warn!(
                    session = %spec.name,
                    attempt,
                    max_attempts,
                    error = %e,
                    "failed to establish session"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        DriverError::SessionFailed("session initialization never attempted".to_string()).into()
    }))
}
