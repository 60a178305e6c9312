//! Scripted harvest demo
//!
//! Runs the full prepare → run → report flow against an in-memory scripted
//! source, standing in for the real browser-automation driver and
//! spreadsheet parser an embedding application would provide:
//! - enumerating the option hierarchy and seeding the registry
//! - driving a two-worker pool to exhaustion
//! - printing the retrieved figures and final counts

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use afr_harvest::config::Config;
use afr_harvest::driver::{DriverConnector, ReportDriver, SelectField, SessionSpec};
use afr_harvest::error::{Error, ParseError, Result};
use afr_harvest::parser::{ArtifactReader, FigureSpec, LabeledValueLookup};
use afr_harvest::Harvester;

/// Fixed option hierarchy with one flaky municipality
struct DemoSource;

impl DemoSource {
    fn counties() -> Vec<String> {
        vec!["-1".into(), "Adams".into(), "Berks".into()]
    }

    fn municipalities(county: &str) -> Vec<String> {
        match county {
            "Adams" => vec!["-1".into(), "Gettysburg Borough".into()],
            "Berks" => vec!["-1".into(), "Reading City".into(), "Quiet Township".into()],
            _ => vec![],
        }
    }

    fn years() -> Vec<String> {
        vec!["-1".into(), "2020".into(), "2021".into()]
    }
}

struct DemoConnector;

#[async_trait]
impl DriverConnector for DemoConnector {
    async fn connect(&self, spec: SessionSpec) -> Result<Box<dyn ReportDriver>> {
        println!("• session {} connected", spec.name);
        Ok(Box::new(DemoDriver {
            download_dir: spec.download_dir,
            selected: Mutex::new(HashMap::new()),
        }))
    }
}

struct DemoDriver {
    download_dir: PathBuf,
    selected: Mutex<HashMap<SelectField, String>>,
}

impl DemoDriver {
    fn selected(&self, field: SelectField) -> String {
        self.selected
            .lock()
            .expect("selection state poisoned")
            .get(&field)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReportDriver for DemoDriver {
    async fn select_value(&self, field: SelectField, value: &str) -> Result<()> {
        self.selected
            .lock()
            .expect("selection state poisoned")
            .insert(field, value.to_string());
        Ok(())
    }

    async fn selected_label(&self, field: SelectField) -> Result<String> {
        Ok(self.selected(field))
    }

    async fn list_options(&self, field: SelectField) -> Result<Vec<String>> {
        Ok(match field {
            SelectField::County => DemoSource::counties(),
            SelectField::Municipality => {
                DemoSource::municipalities(&self.selected(SelectField::County))
            }
            SelectField::Year => DemoSource::years(),
        })
    }

    async fn trigger_render(&self, _timeout: Duration) -> Result<()> {
        // A real driver waits for the report viewer here
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    async fn unavailable_notice_present(&self) -> Result<bool> {
        // Quiet Township never filed its 2021 report
        Ok(self.selected(SelectField::Municipality) == "Quiet Township"
            && self.selected(SelectField::Year) == "2021")
    }

    async fn request_export(&self) -> Result<()> {
        let year: f64 = self.selected(SelectField::Year).parse().unwrap_or(0.0);
        let seed = self.selected(SelectField::Municipality).len() as f64;
        tokio::fs::write(
            self.download_dir.join("report.xlsx"),
            format!("police={};total={}", seed * 1000.0 + year, seed * 10_000.0 + year),
        )
        .await?;
        Ok(())
    }

    async fn resolved_export_url(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reader for the demo's `police=..;total=..` artifacts
struct DemoReader;

impl ArtifactReader for DemoReader {
    fn load_artifact(&self, path: &Path) -> Result<Box<dyn LabeledValueLookup>> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Parse(ParseError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })?;
        let mut fields = HashMap::new();
        for pair in text.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                fields.insert(name.to_string(), value.parse::<f64>().ok());
            }
        }
        Ok(Box::new(DemoLookup { fields }))
    }
}

struct DemoLookup {
    fields: HashMap<String, Option<f64>>,
}

impl LabeledValueLookup for DemoLookup {
    fn find_labeled_value(&self, spec: &FigureSpec) -> Result<Option<f64>> {
        let field = if spec.label.contains("TOTAL") {
            "total"
        } else {
            "police"
        };
        Ok(self.fields.get(field).copied().flatten())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "afr_harvest=info".into()),
        )
        .init();

    let scratch = tempfile::tempdir()?;
    let mut config = Config::default();
    config.persistence.database_path = scratch.path().join("harvest.db");
    config.harvest.output_dir = scratch.path().join("outputs");
    config.harvest.pool_size = 2;
    config.harvest.download_poll_interval = Duration::from_millis(10);
    config.enumeration.poll_interval = Duration::from_millis(10);

    let harvester = Harvester::new(config, Arc::new(DemoConnector), Arc::new(DemoReader)).await?;

    let seeded = harvester.prepare().await?;
    println!(
        "seeded {} report tasks across {} municipalities",
        seeded.discovered, seeded.municipalities
    );

    let summary = harvester.run().await?;
    println!(
        "run complete: {} retrieved, {} unavailable, {} failed ({} tasks, {:.1}/min)",
        summary.counts.retrieved,
        summary.counts.unavailable,
        summary.counts.retrieval_failed,
        summary.processed,
        summary.per_minute(),
    );

    for report in harvester.retrieved_reports().await? {
        println!(
            "  {}: police {:?}, total {:?}",
            report.key(),
            report.police_expenditure,
            report.total_expenditure
        );
    }

    harvester.shutdown().await?;
    Ok(())
}
