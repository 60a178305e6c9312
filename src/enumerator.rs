//! Task enumeration: walking the option hierarchy to seed the registry
//!
//! Selecting a county repopulates the municipality list server-side (and a
//! municipality the year list), so child option lists are re-polled after
//! every parent selection until they stabilize. The poll is bounded: a list
//! that never settles is taken as-is after `max_polls` reads rather than
//! stalling the enumeration forever.

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::driver::{ReportDriver, SelectField};
use crate::error::Result;
use crate::retry::{retryable_by_message, run_with_retry};
use crate::types::{ReportKey, SeedSummary};

/// Walks the source's option hierarchy and seeds the report registry
pub struct TaskEnumerator {
    db: Arc<Database>,
    config: Arc<Config>,
}

impl TaskEnumerator {
    /// Create an enumerator over the given registry
    pub fn new(db: Arc<Database>, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Visit every reachable (county, municipality, year) combination and
    /// seed the registry idempotently
    ///
    /// Existing rows are left untouched whatever their status; option values
    /// equal to the configured sentinel and selections showing the
    /// no-selection label are skipped. Municipality metadata is recorded as
    /// a side effect.
    pub async fn seed(&self, driver: &dyn ReportDriver) -> Result<SeedSummary> {
        let source = &self.config.source;
        let mut summary = SeedSummary::default();

        let county_values = self.stabilized_options(driver, SelectField::County).await?;
        for county_value in self.real_options(&county_values) {
            self.select(driver, SelectField::County, county_value).await?;
            let county = driver.selected_label(SelectField::County).await?;
            if county == source.no_selection_label {
                continue;
            }
            tracing::info!(county = %county, "enumerating county");

            let municipality_values = self
                .stabilized_options(driver, SelectField::Municipality)
                .await?;
            for municipality_value in self.real_options(&municipality_values) {
                self.select(driver, SelectField::Municipality, municipality_value)
                    .await?;
                let municipality = driver.selected_label(SelectField::Municipality).await?;
                if municipality == source.no_selection_label {
                    continue;
                }
                self.db.upsert_municipality(&county, &municipality).await?;

                let year_values = self.stabilized_options(driver, SelectField::Year).await?;
                for year_value in self.real_options(&year_values) {
                    let Ok(year) = year_value.parse::<i64>() else {
                        tracing::warn!(
                            county = %county,
                            municipality = %municipality,
                            value = %year_value,
                            "skipping non-numeric year option"
                        );
                        continue;
                    };
                    self.db
                        .upsert_if_absent(&ReportKey::new(&county, &municipality, year))
                        .await?;
                    summary.discovered += 1;
                }
            }
        }

        summary.municipalities = self.db.municipality_count().await?;
        tracing::info!(
            discovered = summary.discovered,
            municipalities = summary.municipalities,
            "enumeration complete"
        );
        Ok(summary)
    }

    /// Option values minus the sentinel "no selection" entry
    fn real_options<'a>(&'a self, values: &'a [String]) -> impl Iterator<Item = &'a String> {
        values
            .iter()
            .filter(|value| **value != self.config.source.sentinel_option)
    }

    /// Select a value, retrying transient source conditions
    async fn select(&self, driver: &dyn ReportDriver, field: SelectField, value: &str) -> Result<()> {
        let vocabulary = &self.config.source.retryable_messages;
        run_with_retry(
            &self.config.selection_retry,
            |e| retryable_by_message(e, vocabulary),
            || driver.select_value(field, value),
        )
        .await
    }

    /// Poll a field's option list until it reads the same `stable_polls`
    /// times in a row, up to `max_polls` reads
    async fn stabilized_options(
        &self,
        driver: &dyn ReportDriver,
        field: SelectField,
    ) -> Result<Vec<String>> {
        let policy = &self.config.enumeration;
        let mut current: Option<Vec<String>> = None;
        let mut identical_reads: u32 = 0;

        for poll in 1..=policy.max_polls.max(1) {
            let options = driver.list_options(field).await?;
            if current.as_ref() == Some(&options) {
                identical_reads += 1;
            } else {
                current = Some(options);
                identical_reads = 1;
            }

            if identical_reads >= policy.stable_polls.max(1) {
                return Ok(current.unwrap_or_default());
            }
            if poll < policy.max_polls {
                tokio::time::sleep(policy.poll_interval).await;
            }
        }

        tracing::warn!(
            %field,
            polls = policy.max_polls,
            "option list never stabilized, using last observed set"
        );
        Ok(current.unwrap_or_default())
    }
}
