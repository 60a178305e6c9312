//! Extraction-driver boundary
//!
//! The crate never touches the report source directly; everything goes
//! through [`ReportDriver`], a capability interface an embedding application
//! implements on top of whatever browser-automation or HTTP layer it uses.
//! Each worker owns one private session obtained from a [`DriverConnector`],
//! so concurrent workers never share page state or download areas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::Result;

/// The three cascading selection fields of the report form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectField {
    /// County drop-down; selecting it repopulates the municipality list
    County,
    /// Municipality drop-down
    Municipality,
    /// Reporting-year drop-down
    Year,
}

impl SelectField {
    /// All fields in the order the form cascades them
    pub fn cascade_order() -> [SelectField; 3] {
        [
            SelectField::County,
            SelectField::Municipality,
            SelectField::Year,
        ]
    }
}

impl std::fmt::Display for SelectField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectField::County => "county",
            SelectField::Municipality => "municipality",
            SelectField::Year => "year",
        };
        f.write_str(name)
    }
}

/// Everything a driver implementation needs to open one isolated session
#[derive(Clone, Debug)]
pub struct SessionSpec {
    /// Stable name for the session, used in logs ("worker-0", "seeder", ...)
    pub name: String,
    /// Entry URL of the report form
    pub url: Url,
    /// Directory exported artifacts must land in; exclusively owned by one worker
    pub download_dir: PathBuf,
}

/// One isolated session against the report source
///
/// Failures must surface as errors whose display text carries the source's
/// own message; the retry layer classifies them by substring against the
/// configured retryable vocabulary. Implementations decide what "ready"
/// means for [`trigger_render`](Self::trigger_render) but must respect the
/// timeout bound and return [`DriverError::RenderTimeout`] when exceeded.
///
/// [`DriverError::RenderTimeout`]: crate::error::DriverError::RenderTimeout
#[async_trait]
pub trait ReportDriver: Send + Sync {
    /// Select an option value in one of the cascading fields
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::OptionNotFound`] when the value is genuinely
    /// absent from the field, or [`DriverError::Busy`] for transient page
    /// conditions.
    ///
    /// [`DriverError::OptionNotFound`]: crate::error::DriverError::OptionNotFound
    /// [`DriverError::Busy`]: crate::error::DriverError::Busy
    async fn select_value(&self, field: SelectField, value: &str) -> Result<()>;

    /// Display label of the field's current selection
    async fn selected_label(&self, field: SelectField) -> Result<String>;

    /// Current option values of a field, in form order
    ///
    /// The sequence may still be repopulating after a parent selection;
    /// callers poll until it stabilizes.
    async fn list_options(&self, field: SelectField) -> Result<Vec<String>>;

    /// Trigger the report render and wait until the trigger control is ready again
    async fn trigger_render(&self, timeout: Duration) -> Result<()>;

    /// Whether the source is showing its explicit "report not available" notice
    async fn unavailable_notice_present(&self) -> Result<bool>;

    /// Start export of the rendered report into the session's download directory
    async fn request_export(&self) -> Result<()>;

    /// Resolved direct URL of the export, when the source exposes one
    ///
    /// Optional capability: drivers without access to a direct link return
    /// `Ok(None)`. Used as the artifact source by the direct-URL strategy
    /// and stored with the task result either way.
    async fn resolved_export_url(&self) -> Result<Option<String>>;
}

/// Factory for isolated driver sessions
///
/// The pool calls this once per worker slot (plus once for enumeration);
/// session establishment is the only startup-fatal operation a worker has.
#[async_trait]
pub trait DriverConnector: Send + Sync {
    /// Open a new isolated session per `spec`
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::SessionFailed`] when the session cannot be
    /// established; the pool retries a bounded number of times.
    ///
    /// [`DriverError::SessionFailed`]: crate::error::DriverError::SessionFailed
    async fn connect(&self, spec: SessionSpec) -> Result<Box<dyn ReportDriver>>;
}
