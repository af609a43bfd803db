pub mod candidate;
pub mod dispatcher;
pub mod evaluator;

use log::info;
use std::io;
use thiserror::Error;

use crate::checker::dispatcher::{DispatchReport, Dispatcher};
use crate::common::config::Config;
use crate::common::files;
use crate::probe::Probe;

/// Per-candidate failures. None of these stop the batch.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Invalid proxy line format: {0}")]
    InvalidFormat(String),
}

/// Failures that end the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Cannot prepare output file {path}: {source}")]
    Output { path: String, source: io::Error },
    #[error("Cannot read proxy list {path}: {source}")]
    Input { path: String, source: io::Error },
}

/// Clear the output file, check every candidate in the input file and write
/// the alive ones back out.
pub async fn run<P: Probe + 'static>(config: &Config, probe: P) -> Result<DispatchReport, RunError> {
    let output_err = |source| RunError::Output {
        path: config.output_path.clone(),
        source,
    };

    files::truncate_output(&config.output_path).map_err(output_err)?;
    info!(
        "File {} has been cleared before the scan started",
        config.output_path
    );

    let lines = files::read_lines(&config.input_path).map_err(|source| RunError::Input {
        path: config.input_path.clone(),
        source,
    })?;
    info!("Loaded {} proxies from {}", lines.len(), config.input_path);

    let report = Dispatcher::new(probe, config.workers).run(lines).await;

    if report.alive.is_empty() {
        info!("No active proxies found");
    } else {
        files::write_records(&config.output_path, &report.alive).map_err(output_err)?;
        info!(
            "All {} active proxies saved to {}",
            report.alive.len(),
            config.output_path
        );
    }

    Ok(report)
}
