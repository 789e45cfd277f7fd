//! Combine laser-power calibration logs into per-wavelength tables,
//! a workbook (or csv files), and one calibration chart per wavelength.

pub mod cli;
pub mod color;
pub mod data;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod plot;

pub use error::{CalibrationError, Result};
pub use pipeline::{run, RunConfig, RunOutcome, RunSummary};
