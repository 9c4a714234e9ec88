//! `validate` command

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_validation, to_json};
use crate::config::PipelineConfig;
use crate::pipeline::PipelineExecutor;

/// Handle the `validate` command
pub fn handle_validate(config: PipelineConfig, source: &str, format: OutputFormat) -> Result<(), CliError> {
    let mut executor = PipelineExecutor::new(config);
    let report = executor.validate_pipeline(source);

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Text => print!("{}", format_validation(&report)),
    }

    if report.is_valid() {
        Ok(())
    } else {
        Err(CliError::ValidationFailed(report.errors.len().max(1)))
    }
}
