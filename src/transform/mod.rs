//! Transform stage
//!
//! A [`Transformer`] maps a dataset to a new dataset. Every variant returns a
//! value distinct from its input and records the same statistics in its
//! transformation log.

mod passthrough;

pub use passthrough::{PassthroughSettings, PassthroughTransformer};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StageOptions;
use crate::dataset::{Dataset, ValidationError};

/// Shape change produced by one transformation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationStats {
    pub input_rows: usize,
    pub output_rows: usize,
    pub input_columns: usize,
    pub output_columns: usize,
    pub rows_added: i64,
    pub columns_added: i64,
    pub transformer_type: String,
}

impl TransformationStats {
    /// Compare the shapes of an input and an output dataset
    pub fn between(transformer_type: &str, input: &Dataset, output: &Dataset) -> Self {
        Self {
            input_rows: input.num_rows(),
            output_rows: output.num_rows(),
            input_columns: input.num_columns(),
            output_columns: output.num_columns(),
            rows_added: signed_delta(input.num_rows(), output.num_rows()),
            columns_added: signed_delta(input.num_columns(), output.num_columns()),
            transformer_type: transformer_type.to_string(),
        }
    }
}

fn signed_delta(before: usize, after: usize) -> i64 {
    let before = i64::try_from(before).unwrap_or(i64::MAX);
    let after = i64::try_from(after).unwrap_or(i64::MAX);
    after.saturating_sub(before)
}

/// One transformation log entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationRecord {
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: TransformationStats,
}

/// Dataset-to-dataset stage contract
pub trait Transformer: Send {
    /// Variant name, as used in configuration
    fn kind(&self) -> &'static str;

    /// Produce a new dataset from `data`; the input is never modified
    fn transform(&mut self, data: &Dataset, params: &StageOptions) -> Result<Dataset, ValidationError>;

    /// Non-failing structural pre-check; an empty dataset is valid
    fn validate_input(&self, data: &Dataset) -> bool {
        match data.validate() {
            Ok(()) => {
                if data.is_empty() {
                    warn!("Input dataset is empty");
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "Input dataset failed validation");
                false
            }
        }
    }

    /// Shape statistics for one transformation
    fn transformation_stats(&self, input: &Dataset, output: &Dataset) -> TransformationStats {
        TransformationStats::between(self.kind(), input, output)
    }

    /// Copy of the transformation log
    fn transformation_log(&self) -> Vec<TransformationRecord>;

    /// Drop every transformation log entry
    fn clear_transformation_log(&mut self);

    /// Variant name, options and number of logged transformations
    fn metadata(&self) -> StageOptions {
        let mut metadata = StageOptions::new();
        metadata.insert("transformer_type".into(), self.kind().into());
        metadata.insert("config".into(), serde_json::Value::Object(self.config().clone()));
        metadata.insert(
            "transformations_count".into(),
            self.transformation_log().len().into(),
        );
        metadata
    }

    /// Static options the transformer was built with
    fn config(&self) -> &StageOptions;
}
