//! Structured run results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StageOptions;
use crate::load::ExistsPolicy;

/// Extract step of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStep {
    pub success: bool,
    pub rows: usize,
    pub columns: usize,
}

/// Transform step of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStep {
    pub success: bool,
    pub input_rows: usize,
    pub output_rows: usize,
    pub input_columns: usize,
    pub output_columns: usize,
}

/// Load step of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStep {
    pub success: bool,
    pub rows_loaded: usize,
    pub destination: String,
    /// Whether the table was present before the write
    pub table_existed: bool,
    pub if_exists: ExistsPolicy,
}

/// Completed steps; a step is present only once it succeeded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSteps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadStep>,
}

/// Result of one `run` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub source: String,
    pub destination: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub steps: ExecutionSteps,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl ExecutionReport {
    /// Fresh, unfinished report
    pub fn new(
        pipeline_name: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            source: source.into(),
            destination: destination.into(),
            success: false,
            error_message: None,
            steps: ExecutionSteps::default(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// Close the report; `error` marks it failed
    pub fn finish(&mut self, error: Option<String>) {
        let now = Utc::now();
        self.success = error.is_none();
        self.error_message = error;
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(now);
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        if mins > 0 {
            format!("{}m {}s", mins, secs % 60)
        } else if secs > 0 {
            format!("{}.{:03}s", secs, self.duration_ms % 1000)
        } else {
            format!("{}ms", self.duration_ms)
        }
    }
}

/// Result of `validate_pipeline`; never raised, always returned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub config_valid: bool,
    pub source_valid: bool,
    pub loader_connection: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.config_valid && self.source_valid && self.loader_connection && self.errors.is_empty()
    }
}

/// Type and redacted options of one constructed stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: StageOptions,
}

/// Introspection view returned by `PipelineExecutor::info`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: String,
    pub initialized: bool,
    pub executions_count: usize,
    /// Stage details, present once initialized
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extractor: Option<StageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformer: Option<StageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<StageInfo>,
}
