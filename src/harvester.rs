//! Top-level facade tying the registry, enumerator and worker pool together
//!
//! One [`Harvester`] per database. The three operations of a harvest
//! campaign map onto its methods: [`prepare`](Harvester::prepare) discovers
//! and seeds the task space, [`run`](Harvester::run) drives the worker pool
//! to exhaustion, [`reset`](Harvester::reset) requeues everything
//! unfinished. Re-running any of them is safe; completed work is never
//! redone.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{Database, TaskRecord};
use crate::driver::{DriverConnector, SessionSpec};
use crate::enumerator::TaskEnumerator;
use crate::error::Result;
use crate::parser::ArtifactReader;
use crate::pool::{WorkerPool, connect_with_retries};
use crate::types::{RunSummary, SeedSummary, StatusCounts};
use crate::utils::reset_dir;

/// A harvest campaign over one registry
pub struct Harvester {
    /// Registry handle; public for embedders and integration tests that
    /// need to query task state directly
    pub db: Arc<Database>,
    config: Arc<Config>,
    connector: Arc<dyn DriverConnector>,
    reader: Arc<dyn ArtifactReader>,
}

impl Harvester {
    /// Open (or create) the registry and prepare for a session
    ///
    /// Detects an unclean previous shutdown and requeues any rows it left
    /// IN_PROCESS, so a crashed run resumes instead of stranding work.
    pub async fn new(
        config: Config,
        connector: Arc<dyn DriverConnector>,
        reader: Arc<dyn ArtifactReader>,
    ) -> Result<Self> {
        config.validate()?;
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        if db.was_unclean_shutdown().await? {
            tracing::warn!("previous session did not shut down cleanly");
            let reset = db.reset_incomplete().await?;
            if reset > 0 {
                tracing::info!(rows = reset, "requeued reports stranded by the previous session");
            }
        }
        db.set_clean_start().await?;

        Ok(Self {
            db,
            config: Arc::new(config),
            connector,
            reader,
        })
    }

    /// Enumerate the source's option hierarchy and seed the registry
    ///
    /// Idempotent: keys already present are left untouched, whatever their
    /// status. Uses one dedicated driver session.
    pub async fn prepare(&self) -> Result<SeedSummary> {
        let download_dir = self.config.harvest.output_dir.join("seeder");
        reset_dir(&download_dir).await?;

        let spec = SessionSpec {
            name: "seeder".to_string(),
            url: self.config.source.url.clone(),
            download_dir,
        };
        let driver = connect_with_retries(
            self.connector.as_ref(),
            spec,
            self.config.harvest.session_init_attempts,
        )
        .await?;

        let enumerator = TaskEnumerator::new(self.db.clone(), self.config.clone());
        let summary = enumerator.seed(driver.as_ref()).await?;
        self.db
            .set_last_enumeration(chrono::Utc::now().timestamp())
            .await?;
        Ok(summary)
    }

    /// Run the worker pool until no claimable task remains
    pub async fn run(&self) -> Result<RunSummary> {
        WorkerPool::new(
            self.db.clone(),
            self.config.clone(),
            self.connector.clone(),
            self.reader.clone(),
        )
        .run()
        .await
    }

    /// Requeue every unfinished row (anything not RETRIEVED/UNAVAILABLE)
    ///
    /// Returns the number of rows reset.
    pub async fn reset(&self) -> Result<u64> {
        self.db.reset_incomplete().await
    }

    /// Delete every claimable row, forcing the next `prepare` to re-discover it
    ///
    /// Returns the number of rows dropped.
    pub async fn drop_incomplete(&self) -> Result<u64> {
        self.db.drop_incomplete().await
    }

    /// Current per-status row counts
    pub async fn status(&self) -> Result<StatusCounts> {
        self.db.status_counts().await
    }

    /// Every retrieved report with its figures, in key order
    pub async fn retrieved_reports(&self) -> Result<Vec<TaskRecord>> {
        self.db.list_retrieved().await
    }

    /// Mark a clean shutdown and close the registry
    pub async fn shutdown(self) -> Result<()> {
        self.db.set_clean_shutdown().await?;
        self.db.close().await;
        Ok(())
    }
}
