//! CLI module for the data-pipeline binary

pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

pub use error::CliError;
