//! Pipeline executor for running extract, transform and load in sequence

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use super::error::{PipelineError, PipelineResult, StageError};
use super::registry::{self, StageSet};
use super::report::{
    ExecutionReport, ExecutionSteps, ExtractStep, LoadStep, PipelineInfo, StageInfo, TransformStep,
    ValidationReport,
};
use crate::config::{PipelineConfig, StageOptions};
use crate::extract::Extractor;
use crate::load::{ConnectionGuard, LoadError, Loader, redact};
use crate::oplog::OperationLog;
use crate::transform::Transformer;

/// Per-run parameter overrides, applied on top of each stage's settings for
/// one `run` only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    pub extract: StageOptions,
    #[serde(default)]
    pub transform: StageOptions,
    #[serde(default)]
    pub load: StageOptions,
}

impl RunParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extract_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extract.insert(key.into(), value.into());
        self
    }

    pub fn with_transform_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.transform.insert(key.into(), value.into());
        self
    }

    pub fn with_load_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.load.insert(key.into(), value.into());
        self
    }
}

/// Orchestrator composing the configured stages into runs
///
/// Uninitialized until [`initialize`](Self::initialize) resolves the stage
/// selectors; `run` and `validate_pipeline` initialize on first use. All
/// operations take `&mut self`, so one executor drives at most one run at a
/// time.
pub struct PipelineExecutor {
    config: PipelineConfig,
    stages: Option<StageSet>,
    execution_log: OperationLog<ExecutionReport>,
}

impl PipelineExecutor {
    /// Create an uninitialized executor
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            stages: None,
            execution_log: OperationLog::new(),
        }
    }

    /// Create an initialized executor around caller-built stages
    pub fn with_stages(
        config: PipelineConfig,
        extractor: Box<dyn Extractor>,
        transformer: Box<dyn Transformer>,
        loader: Box<dyn Loader>,
    ) -> PipelineResult<Self> {
        let config = config.validated()?;
        Ok(Self {
            config,
            stages: Some(StageSet {
                extractor,
                transformer,
                loader,
            }),
            execution_log: OperationLog::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.stages.is_some()
    }

    /// Validate the configuration and construct every stage; no-op when
    /// already initialized
    pub fn initialize(&mut self) -> PipelineResult<()> {
        self.stages_mut().map(|_| ())
    }

    fn stages_mut(&mut self) -> PipelineResult<&mut StageSet> {
        let stages = match self.stages.take() {
            Some(stages) => stages,
            None => {
                info!(pipeline = %self.config.name, "Initializing pipeline components");
                let stages = self
                    .config
                    .validate()
                    .and_then(|_| registry::resolve(&self.config))
                    .map_err(|e| {
                        error!(pipeline = %self.config.name, error = %e, "Pipeline initialization failed");
                        PipelineError::Initialization(e)
                    })?;
                info!(pipeline = %self.config.name, "Pipeline initialization completed");
                stages
            }
        };
        Ok(self.stages.insert(stages))
    }

    /// Loader of this pipeline, initializing first if needed
    pub fn loader_mut(&mut self) -> PipelineResult<&mut dyn Loader> {
        Ok(self.stages_mut()?.loader.as_mut())
    }

    /// Run extract, transform and load for one source/destination pair
    ///
    /// On failure the returned [`PipelineError::Execution`] carries the
    /// failed report. The report is appended to the execution log on both
    /// paths.
    pub fn run(
        &mut self,
        source: &str,
        destination: &str,
        params: &RunParams,
    ) -> PipelineResult<ExecutionReport> {
        let name = self.config.name.clone();
        let stages = self.stages_mut()?;

        let mut report = ExecutionReport::new(&name, source, destination);
        let span = info_span!("pipeline_run", run_id = %report.run_id, pipeline = %name);
        let _enter = span.enter();
        info!(source, destination, "Starting pipeline execution");

        let result = execute(stages, source, destination, params, &mut report.steps);
        match result {
            Ok(()) => {
                report.finish(None);
                info!(duration_ms = report.duration_ms, "Pipeline execution completed");
                self.execution_log.append(report.clone());
                Ok(report)
            }
            Err(e) => {
                report.finish(Some(e.to_string()));
                error!(stage = e.stage(), error = %e, "Pipeline execution failed");
                self.execution_log.append(report.clone());
                Err(PipelineError::Execution {
                    report: Box::new(report),
                    source: e,
                })
            }
        }
    }

    /// Check configuration, source and loader connectivity
    ///
    /// Never fails; every problem is collected into `errors`.
    pub fn validate_pipeline(&mut self, source: &str) -> ValidationReport {
        let _span = info_span!("pipeline_validate", pipeline = %self.config.name).entered();
        let mut report = ValidationReport::default();

        match self.config.validate() {
            Ok(()) => report.config_valid = true,
            Err(e) => report.errors.push(format!("Invalid configuration: {e}")),
        }

        let stages = match self.stages_mut() {
            Ok(stages) => stages,
            Err(e) => {
                report.errors.push(format!("Validation error: {e}"));
                return report;
            }
        };

        report.source_valid = stages.extractor.validate_source(source);
        if !report.source_valid {
            report.errors.push(format!("Invalid source: {source}"));
        }

        match stages.loader.connect() {
            Ok(()) => {
                report.loader_connection = true;
                stages.loader.disconnect();
            }
            Err(e) => report.errors.push(format!("Loader connection failed: {e}")),
        }

        if report.is_valid() {
            info!("Pipeline validation passed");
        } else {
            warn!(errors = ?report.errors, "Pipeline validation found problems");
        }
        report
    }

    /// Configuration and stage summary with secrets redacted
    pub fn info(&self) -> PipelineInfo {
        let stage = |kind: &str, config: &StageOptions| StageInfo {
            kind: kind.to_string(),
            config: redact(config),
        };
        let stages = self.stages.as_ref();
        PipelineInfo {
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            initialized: stages.is_some(),
            executions_count: self.execution_log.len(),
            extractor: stages.map(|s| stage(s.extractor.kind(), s.extractor.config())),
            transformer: stages.map(|s| stage(s.transformer.kind(), s.transformer.config())),
            loader: stages.map(|s| stage(s.loader.kind(), s.loader.config())),
        }
    }

    /// Copy of every report produced so far
    pub fn execution_log(&self) -> Vec<ExecutionReport> {
        self.execution_log.snapshot()
    }

    pub fn clear_execution_log(&mut self) {
        self.execution_log.clear();
    }
}

impl fmt::Display for PipelineExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineExecutor(name={}, initialized={})",
            self.config.name,
            self.is_initialized()
        )
    }
}

fn execute(
    stages: &mut StageSet,
    source: &str,
    destination: &str,
    params: &RunParams,
    steps: &mut ExecutionSteps,
) -> Result<(), StageError> {
    let extracted = {
        let _stage = info_span!("pipeline_stage", stage = "extract").entered();
        let data = stages.extractor.extract(source, &params.extract)?;
        debug!(rows = data.num_rows(), columns = data.num_columns(), "Extracted");
        data
    };
    steps.extract = Some(ExtractStep {
        success: true,
        rows: extracted.num_rows(),
        columns: extracted.num_columns(),
    });

    let transformed = {
        let _stage = info_span!("pipeline_stage", stage = "transform").entered();
        let data = stages.transformer.transform(&extracted, &params.transform)?;
        debug!(rows = data.num_rows(), columns = data.num_columns(), "Transformed");
        data
    };
    steps.transform = Some(TransformStep {
        success: true,
        input_rows: extracted.num_rows(),
        output_rows: transformed.num_rows(),
        input_columns: extracted.num_columns(),
        output_columns: transformed.num_columns(),
    });

    let outcome = {
        let _stage = info_span!("pipeline_stage", stage = "load").entered();
        let mut loader =
            ConnectionGuard::acquire(stages.loader.as_mut()).map_err(LoadError::from)?;
        loader.load(&transformed, destination, &params.load)?
    };
    steps.load = Some(LoadStep {
        success: true,
        rows_loaded: outcome.rows_loaded,
        destination: outcome.destination,
        table_existed: outcome.table_existed,
        if_exists: outcome.if_exists,
    });
    Ok(())
}
