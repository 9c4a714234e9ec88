//! `info` command

use tracing::warn;

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_info, to_json};
use crate::config::PipelineConfig;
use crate::pipeline::PipelineExecutor;

/// Handle the `info` command; stage details appear only when initialization succeeds
pub fn handle_info(config: PipelineConfig, format: OutputFormat) -> Result<(), CliError> {
    let mut executor = PipelineExecutor::new(config);
    if let Err(e) = executor.initialize() {
        warn!(error = %e, "Pipeline could not be initialized");
    }
    let info = executor.info();

    match format {
        OutputFormat::Json => println!("{}", to_json(&info)?),
        OutputFormat::Text => print!("{}", format_info(&info)),
    }
    Ok(())
}
