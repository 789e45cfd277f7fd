use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::output::OutputFormat;
use crate::pipeline::RunConfig;
use crate::plot::{PlotStyle, DEFAULT_PREFIX};

#[derive(Debug, Parser)]
#[command(
    name = "laser-power-combiner",
    version,
    about = "Combine laser-power calibration logs per wavelength and plot them"
)]
pub struct Cli {
    #[arg(long, help = "Folder containing the calibration logs")]
    pub input: PathBuf,

    #[arg(long, help = "Workbook to write (one sheet per wavelength)")]
    pub output: PathBuf,

    #[arg(long, help = "Folder for chart images (created if missing)")]
    pub plots: PathBuf,

    #[arg(long, value_enum, default_value_t = FormatArg::Spreadsheet)]
    pub format: FormatArg,

    #[arg(long, default_value = ".", help = "Folder for per-wavelength csv files")]
    pub csv_dir: PathBuf,

    #[arg(long, default_value = "csv", help = "Extension of the log files")]
    pub extension: String,

    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub plot_prefix: String,

    #[arg(
        long,
        default_value_t = 2400,
        value_parser = clap::value_parser!(u32).range(1..=PlotStyle::MAX_EDGE as i64),
        help = "Chart width in pixels"
    )]
    pub width: u32,

    #[arg(
        long,
        default_value_t = 1800,
        value_parser = clap::value_parser!(u32).range(1..=PlotStyle::MAX_EDGE as i64),
        help = "Chart height in pixels"
    )]
    pub height: u32,

    #[arg(long, default_value_t = false)]
    pub no_plots: bool,

    #[arg(long, help = "Write a JSON summary of the run")]
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Spreadsheet,
    Delimited,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Spreadsheet => OutputFormat::Spreadsheet,
            FormatArg::Delimited => OutputFormat::Delimited,
        }
    }
}

impl Cli {
    pub fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new(self.input, self.output, self.plots);
        config.format = self.format.into();
        config.delimited_dir = self.csv_dir;
        config.extension = self.extension.trim_start_matches('.').to_string();
        config.plot_prefix = self.plot_prefix;
        config.plot_style = PlotStyle {
            width: self.width,
            height: self.height,
            ..PlotStyle::default()
        };
        config.render_charts = !self.no_plots;
        config.summary_path = self.summary;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_paths_and_defaults() {
        let cli = Cli::try_parse_from([
            "laser-power-combiner",
            "--input",
            "logs",
            "--output",
            "out/combined.xlsx",
            "--plots",
            "out",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.input_dir, PathBuf::from("logs"));
        assert_eq!(config.format, OutputFormat::Spreadsheet);
        assert_eq!(config.extension, "csv");
        assert!(config.render_charts);
        assert_eq!(config.plot_style.width, 2400);
    }

    #[test]
    fn delimited_without_plots() {
        let cli = Cli::try_parse_from([
            "laser-power-combiner",
            "--input",
            "logs",
            "--output",
            "x.xlsx",
            "--plots",
            "p",
            "--format",
            "delimited",
            "--extension",
            ".txt",
            "--no-plots",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.format, OutputFormat::Delimited);
        assert_eq!(config.extension, "txt");
        assert!(!config.render_charts);
    }

    #[test]
    fn chart_size_is_bounded() {
        let base = [
            "laser-power-combiner",
            "--input",
            "logs",
            "--output",
            "out.xlsx",
            "--plots",
            "out",
        ];
        let with = |extra: &[&'static str]| [&base[..], extra].concat();
        assert!(Cli::try_parse_from(with(&["--width", "40000"])).is_err());
        assert!(Cli::try_parse_from(with(&["--height", "0"])).is_err());
        let ok = with(&["--width", "800", "--height", "600"]);
        let config = Cli::try_parse_from(ok).unwrap().into_config();
        assert_eq!((config.plot_style.width, config.plot_style.height), (800, 600));
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["laser-power-combiner", "--input", "logs"]).is_err());
    }
}
