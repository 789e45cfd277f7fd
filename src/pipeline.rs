use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::data::loader::{discover_files, group_by_wavelength, load_source};
use crate::data::merge::merge_group;
use crate::error::{CalibrationError, Result};
use crate::output::{non_empty, select_strategy, CombinedGroups, OutputFormat};
use crate::plot::{PlotStyle, Plotter, DEFAULT_PREFIX};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything one run needs; nothing is read from globals.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Folder holding the calibration logs.
    pub input_dir: PathBuf,
    /// Workbook written by the spreadsheet strategy.
    pub output_spreadsheet: PathBuf,
    /// Folder for chart images, created if missing.
    pub plot_dir: PathBuf,
    pub format: OutputFormat,
    /// Folder for `combined_<wl>nm.csv` files.
    pub delimited_dir: PathBuf,
    /// Extension of the logs, without the dot.
    pub extension: String,
    pub plot_prefix: String,
    pub plot_style: PlotStyle,
    pub render_charts: bool,
    /// Optional JSON run summary.
    pub summary_path: Option<PathBuf>,
}

impl RunConfig {
    /// Defaults for everything except the three required paths.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_spreadsheet: impl Into<PathBuf>,
        plot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_spreadsheet: output_spreadsheet.into(),
            plot_dir: plot_dir.into(),
            format: OutputFormat::default(),
            delimited_dir: PathBuf::from("."),
            extension: "csv".to_string(),
            plot_prefix: DEFAULT_PREFIX.to_string(),
            plot_style: PlotStyle::default(),
            render_charts: true,
            summary_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Run outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub wavelength: u32,
    pub labels: Vec<String>,
    pub files: Vec<String>,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub files_parsed: usize,
    pub groups: Vec<GroupSummary>,
    pub exported: Vec<PathBuf>,
    pub charts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The input folder had no matching files; nothing was written.
    NoInputFiles,
    Completed(RunSummary),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// discover → parse → group → merge → export → plot.
///
/// Any file that fails to parse aborts the whole run.
pub fn run(config: &RunConfig) -> Result<RunOutcome> {
    let files = discover_files(&config.input_dir, &config.extension)?;
    if files.is_empty() {
        warn!(
            "no .{} files found in {}",
            config.extension,
            config.input_dir.display()
        );
        return Ok(RunOutcome::NoInputFiles);
    }
    info!("found {} files in {}", files.len(), config.input_dir.display());

    let sources = files
        .iter()
        .map(|path| load_source(path))
        .collect::<Result<Vec<_>>>()?;
    let files_parsed = sources.len();

    let grouped = group_by_wavelength(sources, &config.extension);

    let mut combined = CombinedGroups::new();
    let mut group_files = Vec::new();
    for (wavelength, group) in &grouped {
        combined.insert(*wavelength, merge_group(group)?);
        group_files.push(group.iter().map(|s| s.file_name.clone()).collect::<Vec<_>>());
    }

    let strategy = select_strategy(
        config.format,
        &config.output_spreadsheet,
        &config.delimited_dir,
    )?;
    info!("exporting to {}", strategy.describe());
    let exported = strategy.write(&combined)?;

    let charts = if config.render_charts {
        Plotter::new(
            &config.plot_dir,
            config.plot_prefix.clone(),
            config.plot_style.clone(),
        )
        .write_all(&combined)?
    } else {
        Vec::new()
    };

    let groups = combined
        .iter()
        .zip(group_files)
        .filter_map(|((wavelength, table), files)| {
            let table = table.as_ref()?;
            Some(GroupSummary {
                wavelength: *wavelength,
                labels: table.series.iter().map(|s| s.label.clone()).collect(),
                files,
                rows: table.len(),
                columns: table.header().into_iter().map(str::to_string).collect(),
            })
        })
        .collect();

    let summary = RunSummary {
        input_dir: config.input_dir.clone(),
        files_parsed,
        groups,
        exported,
        charts,
    };
    if non_empty(&combined).next().is_none() {
        warn!("no wavelength group produced any rows");
    }
    if let Some(path) = &config.summary_path {
        write_summary(path, &summary)?;
    }
    Ok(RunOutcome::Completed(summary))
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
        .map_err(|e| CalibrationError::io(format!("writing {}", path.display()), e))?;
    info!("run summary written to {}", path.display());
    Ok(())
}
