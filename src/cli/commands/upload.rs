//! `upload` command: several CSV files into their tables, in order

use std::path::{Path, PathBuf};

use tracing::info;

use super::params_map;
use super::run::print_report;
use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, to_json};
use crate::config::PipelineConfig;
use crate::pipeline::{ExecutionReport, PipelineExecutor, RunParams};

/// Arguments for the `upload` command
pub struct UploadArgs {
    /// `SOURCE=TABLE` pairs, uploaded in the given order
    pub items: Vec<String>,
    /// Extractor overrides applied to every item
    pub extract: Vec<String>,
}

/// Split `path/to/file.csv=table` at the last `=`
pub fn parse_item(raw: &str) -> Result<(PathBuf, String), CliError> {
    match raw.rsplit_once('=') {
        Some((source, table)) if !source.is_empty() && !table.trim().is_empty() => {
            Ok((PathBuf::from(source), table.trim().to_string()))
        }
        _ => Err(CliError::InvalidArgument(format!(
            "expected SOURCE=TABLE, got '{raw}'"
        ))),
    }
}

fn upload_one(
    executor: &mut PipelineExecutor,
    source: &Path,
    table: &str,
    params: &RunParams,
) -> Result<ExecutionReport, CliError> {
    if !source.is_file() {
        return Err(CliError::SourceNotFound(source.to_path_buf()));
    }
    info!(source = %source.display(), table, "Uploading dataset");
    Ok(executor.run(&source.to_string_lossy(), table, params)?)
}

/// Handle the `upload` command; every table is replaced, the first failure stops the batch
pub fn handle_upload(config: PipelineConfig, args: &UploadArgs, format: OutputFormat) -> Result<(), CliError> {
    let items = args
        .items
        .iter()
        .map(|item| parse_item(item))
        .collect::<Result<Vec<_>, _>>()?;
    let params = RunParams {
        extract: params_map(&args.extract)?,
        ..RunParams::default()
    }
    .with_transform_param("log_details", true)
    .with_load_param("if_exists", "replace");

    let mut executor = PipelineExecutor::new(config);
    executor.initialize()?;

    let mut reports = Vec::with_capacity(items.len());
    for (source, table) in &items {
        match upload_one(&mut executor, source, table, &params) {
            Ok(report) => {
                if format == OutputFormat::Text {
                    print_report(&report, format)?;
                }
                reports.push(report);
            }
            Err(e) => {
                if format == OutputFormat::Json {
                    if let CliError::Pipeline(pipeline) = &e {
                        reports.extend(pipeline.report().cloned());
                    }
                    println!("{}", to_json(&reports)?);
                } else if let CliError::Pipeline(pipeline) = &e {
                    if let Some(report) = pipeline.report() {
                        print_report(report, format)?;
                    }
                }
                return Err(e);
            }
        }
    }

    match format {
        OutputFormat::Json => println!("{}", to_json(&reports)?),
        OutputFormat::Text => {
            let rows: usize = reports
                .iter()
                .filter_map(|r| r.steps.load.as_ref())
                .map(|l| l.rows_loaded)
                .sum();
            println!("Uploaded {} dataset(s), {} rows total", reports.len(), rows);
        }
    }
    Ok(())
}
