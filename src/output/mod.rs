//! Export of merged wavelength tables.
//!
//! The caller picks a strategy once per run. Groups are written in
//! ascending wavelength order; empty or absent groups are skipped.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::data::model::MergedTable;
use crate::error::{CalibrationError, Result};

pub mod delimited;
#[cfg(feature = "xlsx")]
pub mod spreadsheet;

pub use delimited::DelimitedFileWriter;
#[cfg(feature = "xlsx")]
pub use spreadsheet::SpreadsheetWriter;

/// Unit appended to wavelength keys in sheet and file names.
pub const WAVELENGTH_UNIT: &str = "nm";

/// Merged table per wavelength, ascending.
pub type CombinedGroups = BTreeMap<u32, Option<MergedTable>>;

/// Where merged tables end up.
pub trait OutputStrategy {
    /// Human-readable target, used in log lines.
    fn describe(&self) -> String;

    /// Write every non-empty group and return the files created.
    fn write(&self, groups: &CombinedGroups) -> Result<Vec<PathBuf>>;
}

/// Output format requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Spreadsheet,
    Delimited,
}

/// Groups that actually carry rows, in wavelength order.
pub fn non_empty(groups: &CombinedGroups) -> impl Iterator<Item = (u32, &MergedTable)> {
    groups.iter().filter_map(|(wl, table)| match table {
        Some(t) if !t.is_empty() => Some((*wl, t)),
        _ => None,
    })
}

/// `<wavelength>nm`
pub fn group_name(wavelength: u32) -> String {
    format!("{wavelength}{WAVELENGTH_UNIT}")
}

/// Spreadsheet writer, or `CapabilityUnavailable` when built without `xlsx`.
pub fn spreadsheet_writer(path: &Path) -> Result<Box<dyn OutputStrategy>> {
    #[cfg(feature = "xlsx")]
    {
        Ok(Box::new(SpreadsheetWriter::new(path)))
    }
    #[cfg(not(feature = "xlsx"))]
    {
        let _ = path;
        Err(CalibrationError::CapabilityUnavailable("spreadsheet"))
    }
}

/// Pick the writer for this run. A spreadsheet request on a build without
/// spreadsheet support falls back to delimited files.
pub fn select_strategy(
    format: OutputFormat,
    spreadsheet_path: &Path,
    delimited_dir: &Path,
) -> Result<Box<dyn OutputStrategy>> {
    match format {
        OutputFormat::Delimited => Ok(Box::new(DelimitedFileWriter::new(delimited_dir))),
        OutputFormat::Spreadsheet => {
            or_delimited(spreadsheet_writer(spreadsheet_path), delimited_dir)
        }
    }
}

/// Swap a `CapabilityUnavailable` outcome for the delimited writer.
fn or_delimited(
    requested: Result<Box<dyn OutputStrategy>>,
    delimited_dir: &Path,
) -> Result<Box<dyn OutputStrategy>> {
    match requested {
        Err(CalibrationError::CapabilityUnavailable(what)) => {
            warn!("{what} export unavailable, writing delimited files instead");
            Ok(Box::new(DelimitedFileWriter::new(delimited_dir)))
        }
        other => other,
    }
}
