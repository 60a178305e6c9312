//! Worker: one isolated session repeatedly claiming and executing tasks
//!
//! Each worker owns a private driver session and a private download
//! directory, so concurrent workers share nothing but the registry. A task
//! failure is recorded and the worker moves on to its next claim; nothing a
//! single task does can take the pool down. All events carry the worker's
//! slot through a per-worker span.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::{ArtifactStrategy, Config};
use crate::db::{Database, TaskRecord};
use crate::driver::{ReportDriver, SelectField};
use crate::error::{HarvestError, Result};
use crate::parser::{ArtifactReader, extract_figures};
use crate::progress::ProgressTracker;
use crate::retry::{retryable_by_message, run_with_retry};
use crate::types::{FailureKind, ReportKey};
use crate::utils::{reset_dir, wait_for_stable_file};

/// How one task ended when the pipeline ran to completion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskOutcome {
    /// Figures extracted and persisted
    Retrieved,
    /// The source explicitly reported the report as unavailable
    Unavailable,
}

/// Everything a worker needs, assembled by the pool
pub(crate) struct WorkerContext {
    /// Worker slot index, used for logging and progress labels
    pub slot: usize,
    /// The worker's private driver session
    pub driver: Box<dyn ReportDriver>,
    /// Shared artifact reader
    pub reader: Arc<dyn ArtifactReader>,
    /// Shared registry handle
    pub db: Arc<Database>,
    /// Shared configuration
    pub config: Arc<Config>,
    /// Download directory exclusively owned by this worker
    pub download_dir: PathBuf,
    /// Shared progress state
    pub progress: ProgressTracker,
    /// Claim horizon: failures recorded at or after this instant are not re-claimed
    pub retry_horizon: i64,
}

/// One worker slot
pub(crate) struct Worker {
    ctx: WorkerContext,
    http: reqwest::Client,
}

impl Worker {
    pub(crate) fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            http: reqwest::Client::new(),
        }
    }

    /// Claim and execute tasks until the registry has nothing left to hand out
    ///
    /// Returns the number of tasks processed (any outcome).
    pub(crate) async fn run(self) -> u64 {
        let span = tracing::info_span!("worker", worker = self.ctx.slot);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> u64 {
        let mut processed = 0u64;

        loop {
            let task = match self.ctx.db.claim_next(self.ctx.retry_horizon).await {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    // A claim has no task in flight to fail; retire the slot
                    // and let the remaining workers drain the registry.
                    tracing::error!(error = %e, "claim failed, retiring worker slot");
                    break;
                }
            };

            let key = task.key();
            self.ctx
                .progress
                .set_status(self.ctx.slot, format!("harvesting {key}"));

            match self.process(&task).await {
                Ok(TaskOutcome::Retrieved) => {
                    tracing::info!(%key, "report retrieved");
                }
                Ok(TaskOutcome::Unavailable) => {
                    tracing::info!(%key, "report unavailable at source");
                }
                Err(e) => {
                    tracing::warn!(%key, error = %e, "task failed");
                    if let Err(db_err) = self
                        .ctx
                        .db
                        .record_failure(&key, FailureKind::Failed, Some(&e.to_string()))
                        .await
                    {
                        tracing::error!(%key, error = %db_err, "failed to record task failure");
                    }
                }
            }

            processed += 1;
            self.ctx.progress.task_completed();
            self.ctx.progress.set_status(self.ctx.slot, "idle");
        }

        self.ctx.progress.set_status(self.ctx.slot, "done");
        tracing::info!(processed, "worker finished");
        processed
    }

    /// Run the extraction pipeline for one claimed task
    async fn process(&self, task: &TaskRecord) -> Result<TaskOutcome> {
        let key = task.key();

        // Clear any partial artifact a previous failure may have left behind
        reset_dir(&self.ctx.download_dir).await?;

        self.select_key_fields(&key).await?;

        self.ctx
            .driver
            .trigger_render(self.ctx.config.source.render_timeout)
            .await?;

        if self.ctx.driver.unavailable_notice_present().await? {
            self.ctx
                .db
                .record_failure(&key, FailureKind::Unavailable, None)
                .await?;
            return Ok(TaskOutcome::Unavailable);
        }

        let (artifact, export_url) = self.obtain_artifact().await?;

        let lookup = self.ctx.reader.load_artifact(&artifact)?;
        let figures = extract_figures(lookup.as_ref(), &self.ctx.config.parser.variant)?;

        self.ctx
            .db
            .record_success(&key, &figures, export_url.as_deref())
            .await?;

        if let Err(e) = tokio::fs::remove_file(&artifact).await {
            tracing::warn!(path = %artifact.display(), error = %e, "failed to delete artifact");
        }

        Ok(TaskOutcome::Retrieved)
    }

    /// Drive the three cascading selections for the task's key
    ///
    /// Each selection is retried individually: a stale option list is
    /// transient, a genuinely missing option value is fatal for the task.
    async fn select_key_fields(&self, key: &ReportKey) -> Result<()> {
        let year = key.year.to_string();
        let selections = [
            (SelectField::County, key.county.as_str()),
            (SelectField::Municipality, key.municipality.as_str()),
            (SelectField::Year, year.as_str()),
        ];

        let vocabulary = &self.ctx.config.source.retryable_messages;
        let driver = self.ctx.driver.as_ref();
        for (field, value) in selections {
            run_with_retry(
                &self.ctx.config.selection_retry,
                |e| retryable_by_message(e, vocabulary),
                || driver.select_value(field, value),
            )
            .await?;
        }
        Ok(())
    }

    /// Obtain the exported artifact per the configured strategy
    ///
    /// Returns the artifact path and the resolved export locator, when the
    /// driver exposed one.
    async fn obtain_artifact(&self) -> Result<(PathBuf, Option<String>)> {
        let harvest = &self.ctx.config.harvest;
        match self.ctx.config.source.artifact_strategy {
            ArtifactStrategy::ExportAndPoll => {
                // Best-effort: the locator only enriches the registry row here
                let export_url = self.ctx.driver.resolved_export_url().await.unwrap_or_default();

                let vocabulary = &self.ctx.config.source.retryable_messages;
                let driver = self.ctx.driver.as_ref();
                run_with_retry(
                    &self.ctx.config.export_retry,
                    |e| retryable_by_message(e, vocabulary),
                    || driver.request_export(),
                )
                .await?;

                let artifact = wait_for_stable_file(
                    &self.ctx.download_dir,
                    &harvest.artifact_extension,
                    harvest.download_poll_interval,
                    harvest.download_timeout,
                )
                .await?;
                Ok((artifact, export_url))
            }
            ArtifactStrategy::DirectUrl => {
                let url = self
                    .ctx
                    .driver
                    .resolved_export_url()
                    .await?
                    .ok_or(HarvestError::MissingExportUrl)?;
                let artifact = self.fetch_export(&url).await?;
                Ok((artifact, Some(url)))
            }
        }
    }

    /// Fetch the export over HTTP into the worker's download directory
    async fn fetch_export(&self, url: &str) -> Result<PathBuf> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(HarvestError::FetchFailed {
                status: response.status().as_u16(),
            }
            .into());
        }
        let bytes = response.bytes().await?;

        let path = self.ctx.download_dir.join(format!(
            "report.{}",
            self.ctx.config.harvest.artifact_extension
        ));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}
