//! Scripted source, driver and parser fixtures
//!
//! `SourceModel` describes a fake report source: its option hierarchy and
//! how each municipality's report behaves. `ScriptedConnector` hands out
//! isolated `ScriptedDriver` sessions over that model, and `TextReader`
//! parses the tiny `police=..;total=..` artifacts the driver exports.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use afr_harvest::driver::{DriverConnector, ReportDriver, SelectField, SessionSpec};
use afr_harvest::error::{DriverError, Error, ParseError, Result};
use afr_harvest::parser::{ArtifactReader, FigureSpec, LabeledValueLookup};

/// How one municipality's report behaves during extraction
#[derive(Clone, Copy, Debug)]
pub enum TaskBehavior {
    /// Render and export succeed with these figures
    Success {
        /// Police expenditure written into the artifact
        police: f64,
        /// Total expenditure written into the artifact
        total: f64,
    },
    /// The source shows its explicit unavailable notice
    Unavailable,
    /// The export request always fails
    FailExport,
}

/// Description of a fake report source
pub struct SourceModel {
    /// County option values
    pub counties: Vec<String>,
    /// Municipality option values per county
    pub municipalities: HashMap<String, Vec<String>>,
    /// Year option values (shared by all municipalities)
    pub years: Vec<String>,
    /// Behavior per municipality; unlisted municipalities succeed with zeros
    pub behaviors: HashMap<String, TaskBehavior>,
}

impl SourceModel {
    /// Model with the given hierarchy and everything succeeding
    pub fn new(
        counties: &[&str],
        municipalities: &[(&str, &[&str])],
        years: &[&str],
    ) -> Self {
        Self {
            counties: counties.iter().map(|s| s.to_string()).collect(),
            municipalities: municipalities
                .iter()
                .map(|(county, towns)| {
                    (
                        county.to_string(),
                        towns.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
            years: years.iter().map(|s| s.to_string()).collect(),
            behaviors: HashMap::new(),
        }
    }

    /// Override one municipality's behavior
    pub fn with_behavior(mut self, municipality: &str, behavior: TaskBehavior) -> Self {
        self.behaviors.insert(municipality.to_string(), behavior);
        self
    }

    fn behavior(&self, municipality: &str) -> TaskBehavior {
        self.behaviors
            .get(municipality)
            .copied()
            .unwrap_or(TaskBehavior::Success {
                police: 0.0,
                total: 0.0,
            })
    }
}

/// Connector handing out isolated sessions over a shared model
pub struct ScriptedConnector {
    model: Arc<SourceModel>,
    refuse_connects: AtomicU32,
    connects: AtomicU32,
}

impl ScriptedConnector {
    /// Connector whose sessions always come up
    pub fn new(model: SourceModel) -> Self {
        Self {
            model: Arc::new(model),
            refuse_connects: AtomicU32::new(0),
            connects: AtomicU32::new(0),
        }
    }

    /// Refuse the first `n` connection attempts
    pub fn refusing_first(self, n: u32) -> Self {
        self.refuse_connects.store(n, Ordering::SeqCst);
        self
    }

    /// Total connection attempts observed
    pub fn connect_attempts(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverConnector for ScriptedConnector {
    async fn connect(&self, spec: SessionSpec) -> Result<Box<dyn ReportDriver>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self
            .refuse_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Driver(DriverError::SessionFailed(format!(
                "{} refused by scripted connector",
                spec.name
            ))));
        }
        Ok(Box::new(ScriptedDriver {
            model: self.model.clone(),
            download_dir: spec.download_dir,
            selected: Mutex::new(HashMap::new()),
        }))
    }
}

/// One scripted session
pub struct ScriptedDriver {
    model: Arc<SourceModel>,
    download_dir: PathBuf,
    selected: Mutex<HashMap<SelectField, String>>,
}

impl ScriptedDriver {
    fn selected(&self, field: SelectField) -> String {
        self.selected
            .lock()
            .unwrap()
            .get(&field)
            .cloned()
            .unwrap_or_default()
    }

    fn options_for(&self, field: SelectField) -> Vec<String> {
        match field {
            SelectField::County => self.model.counties.clone(),
            SelectField::Municipality => self
                .model
                .municipalities
                .get(&self.selected(SelectField::County))
                .cloned()
                .unwrap_or_default(),
            SelectField::Year => self.model.years.clone(),
        }
    }
}

#[async_trait]
impl ReportDriver for ScriptedDriver {
    async fn select_value(&self, field: SelectField, value: &str) -> Result<()> {
        if !self.options_for(field).iter().any(|option| option == value) {
            return Err(Error::Driver(DriverError::OptionNotFound {
                field,
                value: value.to_string(),
            }));
        }
        self.selected
            .lock()
            .unwrap()
            .insert(field, value.to_string());
        Ok(())
    }

    async fn selected_label(&self, field: SelectField) -> Result<String> {
        Ok(self.selected(field))
    }

    async fn list_options(&self, field: SelectField) -> Result<Vec<String>> {
        Ok(self.options_for(field))
    }

    async fn trigger_render(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn unavailable_notice_present(&self) -> Result<bool> {
        Ok(matches!(
            self.model.behavior(&self.selected(SelectField::Municipality)),
            TaskBehavior::Unavailable
        ))
    }

    async fn request_export(&self) -> Result<()> {
        match self.model.behavior(&self.selected(SelectField::Municipality)) {
            TaskBehavior::Success { police, total } => {
                tokio::fs::write(
                    self.download_dir.join("report.xlsx"),
                    format!("police={police};total={total}"),
                )
                .await?;
                Ok(())
            }
            TaskBehavior::FailExport => Err(Error::Driver(DriverError::Other(
                "export control rejected the request".to_string(),
            ))),
            TaskBehavior::Unavailable => Err(Error::Driver(DriverError::Other(
                "export requested for an unavailable report".to_string(),
            ))),
        }
    }

    async fn resolved_export_url(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reader over the scripted driver's `police=..;total=..` artifacts
pub struct TextReader;

impl ArtifactReader for TextReader {
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
        if fields.is_empty() {
            return Err(Error::Parse(ParseError::Malformed {
                path: path.to_path_buf(),
                reason: "no figure fields".to_string(),
            }));
        }

        Ok(Box::new(TextLookup {
            police: fields.get("police").copied().flatten(),
            total: fields.get("total").copied().flatten(),
        }))
    }
}

/// Lookup over one parsed text artifact
pub struct TextLookup {
    police: Option<f64>,
    total: Option<f64>,
}

impl LabeledValueLookup for TextLookup {
    fn find_labeled_value(&self, spec: &FigureSpec) -> Result<Option<f64>> {
        if spec.label.contains("TOTAL") {
            Ok(self.total)
        } else {
            Ok(self.police)
        }
    }
}
