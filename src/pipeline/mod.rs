//! Pipeline orchestration
//!
//! [`PipelineExecutor`] resolves the configured stage selectors into stage
//! instances and runs extract, transform and load in order, holding the
//! loader connection only for the load step.
//!
//! # Example
//!
//! ```rust,ignore
//! use data_pipeline::pipeline::{PipelineExecutor, RunParams};
//!
//! let mut executor = PipelineExecutor::new(config);
//! match executor.run("data/users.csv", "users", &RunParams::new()) {
//!     Ok(report) => println!("loaded {} rows", report.steps.load.unwrap().rows_loaded),
//!     Err(e) => {
//!         if let Some(report) = e.report() {
//!             eprintln!("run {} failed: {:?}", report.run_id, report.error_message);
//!         }
//!     }
//! }
//! ```

mod error;
mod executor;
mod registry;
mod report;

pub use error::{PipelineError, PipelineResult, StageError};
pub use executor::{PipelineExecutor, RunParams};
pub use report::{
    ExecutionReport, ExecutionSteps, ExtractStep, LoadStep, PipelineInfo, StageInfo, TransformStep,
    ValidationReport,
};

use crate::config::PipelineConfig;

/// Build an executor and run it once
pub fn run_pipeline(
    config: PipelineConfig,
    source: &str,
    destination: &str,
    params: &RunParams,
) -> PipelineResult<ExecutionReport> {
    let mut executor = PipelineExecutor::new(config);
    executor.run(source, destination, params)
}
