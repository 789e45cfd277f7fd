use anyhow::Context;
use clap::Parser;

use laser_power_combiner::cli::Cli;
use laser_power_combiner::{run, RunOutcome};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    let outcome = run(&config)
        .with_context(|| format!("combining logs from {}", config.input_dir.display()))?;

    if let RunOutcome::Completed(summary) = outcome {
        log::info!(
            "done: {} files, {} wavelength groups, {} exports, {} charts",
            summary.files_parsed,
            summary.groups.len(),
            summary.exported.len(),
            summary.charts.len()
        );
    }
    Ok(())
}
