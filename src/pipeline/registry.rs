//! Stage type selectors to constructors
//!
//! Adding a variant means one enum case in `config::stage` and one arm here.

use tracing::debug;

use crate::config::{ConfigurationError, ExtractorType, LoaderType, PipelineConfig, StageOptions, TransformerType};
use crate::extract::{CsvExtractor, Extractor};
use crate::load::{Loader, build_duckdb, build_mysql};
use crate::transform::{PassthroughTransformer, Transformer};

pub(crate) type ExtractorFactory = fn(StageOptions) -> Result<Box<dyn Extractor>, ConfigurationError>;
pub(crate) type TransformerFactory = fn(StageOptions) -> Result<Box<dyn Transformer>, ConfigurationError>;
pub(crate) type LoaderFactory = fn(StageOptions) -> Result<Box<dyn Loader>, ConfigurationError>;

fn csv_extractor(options: StageOptions) -> Result<Box<dyn Extractor>, ConfigurationError> {
    Ok(Box::new(CsvExtractor::new(options)?))
}

fn passthrough_transformer(options: StageOptions) -> Result<Box<dyn Transformer>, ConfigurationError> {
    Ok(Box::new(PassthroughTransformer::new(options)?))
}

pub(crate) fn extractor_factory(kind: ExtractorType) -> ExtractorFactory {
    match kind {
        ExtractorType::Csv => csv_extractor,
    }
}

pub(crate) fn transformer_factory(kind: TransformerType) -> TransformerFactory {
    match kind {
        TransformerType::Passthrough => passthrough_transformer,
    }
}

pub(crate) fn loader_factory(kind: LoaderType) -> LoaderFactory {
    match kind {
        LoaderType::Mysql => build_mysql,
        LoaderType::Duckdb => build_duckdb,
    }
}

/// Constructed stage instances of one executor
pub(crate) struct StageSet {
    pub extractor: Box<dyn Extractor>,
    pub transformer: Box<dyn Transformer>,
    pub loader: Box<dyn Loader>,
}

/// Build every stage from a validated configuration
///
/// The database section is merged into the loader options when the loader
/// type needs a connection.
pub(crate) fn resolve(config: &PipelineConfig) -> Result<StageSet, ConfigurationError> {
    debug!(
        extractor = %config.extractor.kind,
        transformer = %config.transformer.kind,
        loader = %config.loader.kind,
        "Resolving pipeline stages"
    );
    let extractor = extractor_factory(config.extractor.kind)(config.extractor.config.clone())?;
    let transformer = transformer_factory(config.transformer.kind)(config.transformer.config.clone())?;
    let loader = loader_factory(config.loader.kind)(config.resolved_loader_options())?;
    Ok(StageSet {
        extractor,
        transformer,
        loader,
    })
}
