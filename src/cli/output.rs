//! Output formatting for CLI

use clap::ValueEnum;
use serde::Serialize;

use super::error::CliError;
use crate::dataset::Dataset;
use crate::pipeline::{ExecutionReport, PipelineInfo, StageInfo, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Pretty JSON for any report type
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))
}

/// Format one execution report
pub fn format_report(report: &ExecutionReport) -> String {
    let mut output = String::new();
    let status = if report.success { "succeeded" } else { "failed" };
    output.push_str(&format!(
        "Pipeline '{}' {} ({})\n",
        report.pipeline_name,
        status,
        report.duration_formatted()
    ));
    output.push_str(&format!("  Run ID:      {}\n", report.run_id));
    output.push_str(&format!("  Source:      {}\n", report.source));
    output.push_str(&format!("  Destination: {}\n", report.destination));

    if let Some(extract) = &report.steps.extract {
        output.push_str(&format!(
            "  extract:   {} rows, {} columns\n",
            extract.rows, extract.columns
        ));
    }
    if let Some(transform) = &report.steps.transform {
        output.push_str(&format!(
            "  transform: {} -> {} rows, {} -> {} columns\n",
            transform.input_rows, transform.output_rows, transform.input_columns, transform.output_columns
        ));
    }
    if let Some(load) = &report.steps.load {
        let action = if load.table_existed { "updated" } else { "created" };
        output.push_str(&format!(
            "  load:      {} rows into '{}' ({}, if_exists={})\n",
            load.rows_loaded, load.destination, action, load.if_exists
        ));
    }
    if let Some(error) = &report.error_message {
        output.push_str(&format!("  Error: {error}\n"));
    }
    output
}

/// Format a validation report
pub fn format_validation(report: &ValidationReport) -> String {
    let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
    let mut output = String::new();
    output.push_str(&format!("Configuration:     {}\n", mark(report.config_valid)));
    output.push_str(&format!("Source:            {}\n", mark(report.source_valid)));
    output.push_str(&format!("Loader connection: {}\n", mark(report.loader_connection)));
    if !report.errors.is_empty() {
        output.push_str("\nErrors:\n");
        for error in &report.errors {
            output.push_str(&format!("  - {error}\n"));
        }
    }
    output
}

/// Format pipeline info
pub fn format_info(info: &PipelineInfo) -> String {
    let mut output = String::new();
    output.push_str(&format!("Pipeline: {}\n", info.name));
    if !info.description.is_empty() {
        output.push_str(&format!("Description: {}\n", info.description));
    }
    output.push_str(&format!("Initialized: {}\n", info.initialized));
    output.push_str(&format!("Executions: {}\n", info.executions_count));

    let stages = [
        ("Extractor", &info.extractor),
        ("Transformer", &info.transformer),
        ("Loader", &info.loader),
    ];
    for (label, stage) in stages {
        if let Some(StageInfo { kind, config }) = stage {
            output.push_str(&format!("{label}: {kind}\n"));
            for (key, value) in config {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                output.push_str(&format!("  {key} = {value}\n"));
            }
        }
    }
    output
}

/// Tab-separated table of a dataset
pub fn format_dataset(data: &Dataset) -> String {
    if data.num_columns() == 0 {
        return "No results.\n".to_string();
    }
    let names = data.column_names();
    let mut output = String::new();
    output.push_str(&names.join("\t"));
    output.push('\n');
    output.push_str(&names.iter().map(|_| "---").collect::<Vec<_>>().join("\t"));
    output.push('\n');
    for row in data.rows() {
        let values: Vec<String> = row
            .iter()
            .map(|v| if v.is_null() { "NULL".to_string() } else { v.to_string() })
            .collect();
        output.push_str(&values.join("\t"));
        output.push('\n');
    }
    output.push_str(&format!("({} rows)\n", data.num_rows()));
    output
}
