//! Extract stage
//!
//! An [`Extractor`] turns a source locator into a [`Dataset`]. Variants are
//! selected by [`ExtractorType`](crate::config::ExtractorType).

mod csv;
mod encoding;
mod error;

pub use self::csv::{CsvExtractor, CsvSettings};
pub use encoding::{DecodeFailure, Encoding};
pub use error::{ExtractionError, ExtractionErrorKind};

use crate::config::StageOptions;
use crate::dataset::Dataset;

/// Source reader contract
pub trait Extractor: Send {
    /// Variant name, as used in configuration
    fn kind(&self) -> &'static str;

    /// Read the source into a dataset
    ///
    /// `params` override the static options for this call only.
    fn extract(&self, source: &str, params: &StageOptions) -> Result<Dataset, ExtractionError>;

    /// Cheap existence/readability pre-check; never fails
    fn validate_source(&self, source: &str) -> bool {
        !source.trim().is_empty()
    }

    /// Descriptive information about a source; fields that cannot be read are omitted
    fn metadata(&self, source: &str) -> StageOptions {
        base_metadata(self.kind(), source, self.config())
    }

    /// Static options the extractor was built with
    fn config(&self) -> &StageOptions;
}

/// Metadata fields shared by every extractor
pub(crate) fn base_metadata(kind: &str, source: &str, config: &StageOptions) -> StageOptions {
    let mut metadata = StageOptions::new();
    metadata.insert("source".into(), source.into());
    metadata.insert("extractor_type".into(), kind.into());
    metadata.insert("config".into(), serde_json::Value::Object(config.clone()));
    metadata
}
