//! CLI error type

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::load::LoadError;
use crate::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Pipeline validation failed with {0} error(s)")]
    ValidationFailed(usize),

    #[error("Failed to format output: {0}")]
    Output(String),
}

impl CliError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            CliError::Config(e) => e.user_message(),
            CliError::Pipeline(e) => e.user_message(),
            CliError::Load(e) => e.user_message(),
            CliError::InvalidArgument(_) => {
                format!("{self}\n\nHint: Run with --help to see the expected arguments.")
            }
            CliError::SourceNotFound(_) => {
                format!("{self}\n\nHint: Check that the file exists and the path is correct.")
            }
            _ => self.to_string(),
        }
    }
}
