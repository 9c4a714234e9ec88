//! Error types for pipeline operations
//!
//! Stage-level failures are wrapped exactly once into [`PipelineError`],
//! which carries the failed run's report alongside the cause.

use thiserror::Error;

use super::report::ExecutionReport;
use crate::config::ConfigurationError;
use crate::dataset::ValidationError;
use crate::extract::ExtractionError;
use crate::load::LoadError;

/// Failure of one stage during a run
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Extract(#[from] ExtractionError),

    #[error(transparent)]
    Transform(#[from] ValidationError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl StageError {
    /// Name of the failed stage
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Extract(_) => "extract",
            StageError::Transform(_) => "transform",
            StageError::Load(_) => "load",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            StageError::Extract(e) => e.user_message(),
            StageError::Transform(e) => e.to_string(),
            StageError::Load(e) => e.user_message(),
        }
    }
}

/// The single error type returned by `initialize()` and `run()`
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration invalid or a stage rejected its options
    #[error("Initialization failed: {0}")]
    Initialization(#[from] ConfigurationError),

    /// A stage failed during `run`; the report has `success == false`
    #[error("Pipeline execution failed: {source}")]
    Execution {
        report: Box<ExecutionReport>,
        #[source]
        source: StageError,
    },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Report of the failed run, if the failure happened during execution
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            PipelineError::Execution { report, .. } => Some(report),
            PipelineError::Initialization(_) => None,
        }
    }

    /// Get the stage name if a stage failed
    pub fn stage_name(&self) -> Option<&'static str> {
        match self {
            PipelineError::Execution { source, .. } => Some(source.stage()),
            PipelineError::Initialization(_) => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Initialization(e) => format!("Initialization failed: {}", e.user_message()),
            PipelineError::Execution { source, .. } => {
                format!("Stage '{}' failed: {}", source.stage(), source.user_message())
            }
        }
    }
}
