//! Data Pipeline - configuration-driven ETL orchestration
//!
//! Provides:
//! - A tabular [`Dataset`] value shared by every stage
//! - Pluggable extract / transform / load stages behind capability traits
//! - Validated pipeline configuration (literal, TOML/YAML/JSON, environment)
//! - The [`PipelineExecutor`] orchestrator producing structured execution reports
//!
//! # Example
//!
//! ```rust,ignore
//! use data_pipeline::{PipelineConfig, PipelineExecutor, RunParams};
//!
//! let config = PipelineConfig::from_toml_file("pipeline.toml")?;
//! let mut executor = PipelineExecutor::new(config);
//! let report = executor.run(
//!     "data/users.csv",
//!     "users",
//!     &RunParams::new().with_load_param("if_exists", "replace"),
//! )?;
//! assert!(report.success);
//! ```

pub mod config;
pub mod dataset;
pub mod extract;
pub mod load;
pub mod oplog;
pub mod pipeline;
pub mod transform;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::{
    ConfigurationError, DatabaseConfig, ExtractorType, LoaderType, PipelineConfig, StageOptions,
    TransformerType,
};
pub use dataset::{Column, DataType, Dataset, ValidationError, Value};
pub use extract::{CsvExtractor, ExtractionError, ExtractionErrorKind, Extractor};
pub use load::{
    ConnectionError, ConnectionGuard, ExistsPolicy, LoadError, LoadOutcome, LoadRecord, LoadStats,
    Loader, SqlLoader, TableInfo,
};
pub use oplog::OperationLog;
pub use pipeline::{
    ExecutionReport, PipelineError, PipelineExecutor, PipelineInfo, PipelineResult, RunParams,
    StageError, ValidationReport,
};
pub use transform::{
    PassthroughTransformer, TransformationRecord, TransformationStats, Transformer,
};
