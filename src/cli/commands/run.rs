//! `run` command: one source into one destination

use std::path::PathBuf;

use super::params_map;
use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_report, to_json};
use crate::config::PipelineConfig;
use crate::load::ExistsPolicy;
use crate::pipeline::{ExecutionReport, PipelineExecutor, RunParams};

/// Arguments for the `run` command
pub struct RunArgs {
    /// Source CSV file
    pub source: PathBuf,
    /// Destination table
    pub destination: String,
    /// Extractor overrides as KEY=VALUE
    pub extract: Vec<String>,
    /// Transformer overrides as KEY=VALUE
    pub transform: Vec<String>,
    /// Loader overrides as KEY=VALUE
    pub load: Vec<String>,
    /// Shorthand for `--load if_exists=...`
    pub if_exists: Option<ExistsPolicy>,
}

impl RunArgs {
    pub fn run_params(&self) -> Result<RunParams, CliError> {
        let mut params = RunParams {
            extract: params_map(&self.extract)?,
            transform: params_map(&self.transform)?,
            load: params_map(&self.load)?,
        };
        if let Some(policy) = self.if_exists {
            params.load.insert("if_exists".into(), policy.as_str().into());
        }
        Ok(params)
    }
}

pub fn print_report(report: &ExecutionReport, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Text => print!("{}", format_report(report)),
    }
    Ok(())
}

/// Handle the `run` command
pub fn handle_run(config: PipelineConfig, args: &RunArgs, format: OutputFormat) -> Result<(), CliError> {
    let params = args.run_params()?;
    let mut executor = PipelineExecutor::new(config);

    match executor.run(&args.source.to_string_lossy(), &args.destination, &params) {
        Ok(report) => print_report(&report, format),
        Err(e) => {
            if let Some(report) = e.report() {
                print_report(report, format)?;
            }
            Err(e.into())
        }
    }
}
