use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a combiner run.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("no '{marker}' line found in {}", path.display())]
    MarkerNotFound { path: PathBuf, marker: &'static str },

    #[error("{}: line {line} has {found} fields but the header declares {expected}", path.display())]
    RowWidthMismatch {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("source '{file_name}' has no '{column}' column")]
    MissingKeyColumn { file_name: String, column: String },

    #[error("{0} support was not compiled into this build")]
    CapabilityUnavailable(&'static str),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("delimited data: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet export: {0}")]
    Spreadsheet(String),

    #[error("invalid file pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("failed to render chart: {0}")]
    Plot(String),

    #[error("run summary: {0}")]
    Summary(#[from] serde_json::Error),
}

impl CalibrationError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CalibrationError::Io {
            context: context.into(),
            source,
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for CalibrationError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        CalibrationError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for CalibrationError {
    fn from(value: image::ImageError) -> Self {
        CalibrationError::Plot(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
