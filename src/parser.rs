//! Artifact-parser boundary and figure lookup specs
//!
//! The exported artifact is a spreadsheet; decoding it is the embedding
//! application's concern. The crate specifies *what* to read — a
//! [`FigureSpec`] per figure, grouped by [`ReportVariant`] — and consumes
//! any implementation of the [`ArtifactReader`] / [`LabeledValueLookup`]
//! capability interfaces.
//!
//! Report layouts differ in how the police-expenditure row is labeled, so
//! the lookup configuration is selected by a tagged variant instead of an
//! implementation hierarchy: the figures change, the reader does not.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::types::ReportFigures;

/// How a label cell is compared against a spec's label text
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// The trimmed cell text equals the label exactly
    Exact,
    /// The trimmed cell text starts with the label (account codes)
    LeadingCode,
}

/// One labeled figure to pull out of a report sheet
///
/// Scans `label_column` for a cell matching `label`, then reads the numeric
/// cell in `value_column` on the same row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSpec {
    /// Sheet the figure lives on
    pub sheet: String,
    /// Column holding the row labels
    pub label_column: String,
    /// Label text identifying the row
    pub label: String,
    /// How the label is matched
    pub matching: LabelMatch,
    /// Column holding the figure values
    pub value_column: String,
}

impl FigureSpec {
    fn new(
        sheet: &str,
        label_column: &str,
        label: &str,
        matching: LabelMatch,
        value_column: &str,
    ) -> Self {
        Self {
            sheet: sheet.to_string(),
            label_column: label_column.to_string(),
            label: label.to_string(),
            matching,
            value_column: value_column.to_string(),
        }
    }
}

/// Sheet the revenues-and-expenditures figures live on
const EXPENDITURES_SHEET: &str = "Sheet3";

/// Known report layouts
///
/// Both read TOTAL EXPENDITURES the same way; they differ in how the police
/// row is identified.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportVariant {
    /// Police row carries account code 410.00 in the code column
    #[default]
    ByAccountCode,
    /// Police row is labeled "Police" in the description column
    ByRowLabel,
}

impl ReportVariant {
    /// Spec for the police-expenditure figure
    pub fn police_spec(&self) -> FigureSpec {
        match self {
            ReportVariant::ByAccountCode => FigureSpec::new(
                EXPENDITURES_SHEET,
                "A",
                "410.00",
                LabelMatch::LeadingCode,
                "J",
            ),
            ReportVariant::ByRowLabel => {
                FigureSpec::new(EXPENDITURES_SHEET, "B", "Police", LabelMatch::Exact, "J")
            }
        }
    }

    /// Spec for the total-expenditure figure
    pub fn total_spec(&self) -> FigureSpec {
        FigureSpec::new(
            EXPENDITURES_SHEET,
            "B",
            "TOTAL EXPENDITURES",
            LabelMatch::Exact,
            "J",
        )
    }
}

/// Opens downloaded artifacts
///
/// One reader is shared by all workers; the loaded artifact it returns is
/// owned by the worker that loaded it.
pub trait ArtifactReader: Send + Sync {
    /// Open the artifact at `path`
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::LoadFailed`] or [`ParseError::Malformed`] when
    /// the file cannot be structurally parsed; this is fatal for the task.
    ///
    /// [`ParseError::LoadFailed`]: crate::error::ParseError::LoadFailed
    /// [`ParseError::Malformed`]: crate::error::ParseError::Malformed
    fn load_artifact(&self, path: &Path) -> Result<Box<dyn LabeledValueLookup>>;
}

/// Cell lookup over one loaded artifact
pub trait LabeledValueLookup: Send {
    /// Locate the row matching `spec` and read its value cell
    ///
    /// `Ok(None)` when the label or the value cell is absent — a tolerated
    /// partial result, not an error.
    fn find_labeled_value(&self, spec: &FigureSpec) -> Result<Option<f64>>;
}

/// Read both configured figures out of a loaded artifact
///
/// Missing labels come back as `None`; only lookup errors (malformed sheet
/// structure) propagate.
pub fn extract_figures(
    lookup: &dyn LabeledValueLookup,
    variant: &ReportVariant,
) -> Result<ReportFigures> {
    let police_expenditure = lookup.find_labeled_value(&variant.police_spec())?;
    let total_expenditure = lookup.find_labeled_value(&variant.total_spec())?;
    Ok(ReportFigures {
        police_expenditure,
        total_expenditure,
    })
}
