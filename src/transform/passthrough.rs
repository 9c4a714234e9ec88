//! Identity transformer

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{Span, error, info, info_span};

use super::{TransformationRecord, Transformer};
use crate::config::{ConfigurationError, StageOptions, overlay_settings, parse_settings};
use crate::dataset::{Dataset, ValidationError};
use crate::oplog::OperationLog;

/// Passthrough options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PassthroughSettings {
    /// Append a log entry for every transformation
    pub log_details: bool,
}

impl Default for PassthroughSettings {
    fn default() -> Self {
        Self { log_details: true }
    }
}

/// Returns a structural copy of its input
#[derive(Debug)]
pub struct PassthroughTransformer {
    options: StageOptions,
    settings: PassthroughSettings,
    log: OperationLog<TransformationRecord>,
    span: Span,
}

impl PassthroughTransformer {
    /// Build from stage options
    pub fn new(options: StageOptions) -> Result<Self, ConfigurationError> {
        let settings = parse_settings("passthrough transformer", &options)?;
        Ok(Self {
            options,
            settings,
            log: OperationLog::new(),
            span: info_span!("transformer", kind = "passthrough"),
        })
    }

    /// Build with default options
    pub fn with_defaults() -> Self {
        Self {
            options: StageOptions::new(),
            settings: PassthroughSettings::default(),
            log: OperationLog::new(),
            span: info_span!("transformer", kind = "passthrough"),
        }
    }

    /// Effective static settings
    pub fn settings(&self) -> &PassthroughSettings {
        &self.settings
    }
}

impl Transformer for PassthroughTransformer {
    fn kind(&self) -> &'static str {
        "passthrough"
    }

    fn transform(&mut self, data: &Dataset, params: &StageOptions) -> Result<Dataset, ValidationError> {
        let span = self.span.clone();
        let _enter = span.enter();

        let settings = overlay_settings("passthrough transformer", &self.settings, params)
            .map_err(|e| ValidationError::InvalidParams(e.to_string()))?;
        if let Err(e) = data.validate() {
            error!(error = %e, "Invalid input data for transformation");
            return Err(e);
        }
        self.validate_input(data);

        info!(rows = data.num_rows(), "Passthrough transformation");
        let output = data.clone();

        if settings.log_details {
            let stats = self.transformation_stats(data, &output);
            info!(
                input_rows = stats.input_rows,
                output_rows = stats.output_rows,
                input_columns = stats.input_columns,
                output_columns = stats.output_columns,
                "Transformation 'passthrough'"
            );
            self.log.append(TransformationRecord {
                operation: "passthrough".to_string(),
                timestamp: Utc::now(),
                stats,
            });
        }
        Ok(output)
    }

    fn transformation_log(&self) -> Vec<TransformationRecord> {
        self.log.snapshot()
    }

    fn clear_transformation_log(&mut self) {
        self.log.clear();
    }

    fn config(&self) -> &StageOptions {
        &self.options
    }
}
