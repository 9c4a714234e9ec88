//! `query` command: run one statement against the configured destination

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_dataset, to_json};
use crate::config::PipelineConfig;
use crate::load::{ConnectionGuard, LoadError};
use crate::pipeline::PipelineExecutor;

/// Handle the `query` command
pub fn handle_query(config: PipelineConfig, sql: &str, format: OutputFormat) -> Result<(), CliError> {
    let mut executor = PipelineExecutor::new(config);
    let loader = executor.loader_mut()?;
    let mut guard = ConnectionGuard::acquire(loader).map_err(LoadError::from)?;

    match (guard.execute_query(sql)?, format) {
        (Some(data), OutputFormat::Json) => println!("{}", to_json(&data.to_records())?),
        (Some(data), OutputFormat::Text) => print!("{}", format_dataset(&data)),
        (None, _) => println!("Query executed"),
    }
    Ok(())
}
