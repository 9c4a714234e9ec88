use std::path::PathBuf;

use clap::{Parser, Subcommand};

use data_pipeline::ExistsPolicy;
use data_pipeline::cli::commands::run::RunArgs;
use data_pipeline::cli::commands::upload::UploadArgs;
use data_pipeline::cli::commands::{info, load_config, query, run, upload, validate};
use data_pipeline::cli::output::OutputFormat;
use data_pipeline::cli::{CliError, logging};

#[derive(Parser)]
#[command(
    name = "data-pipeline",
    version,
    about = "Load CSV files into a relational database"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pipeline configuration file (.toml, .yaml, .json or .env); defaults to the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one source and destination table
    Run {
        /// Source CSV file
        source: PathBuf,
        /// Destination table
        destination: String,
        /// Extractor override (KEY=VALUE), repeatable
        #[arg(long = "extract", value_name = "KEY=VALUE")]
        extract: Vec<String>,
        /// Transformer override (KEY=VALUE), repeatable
        #[arg(long = "transform", value_name = "KEY=VALUE")]
        transform: Vec<String>,
        /// Loader override (KEY=VALUE), repeatable
        #[arg(long = "load", value_name = "KEY=VALUE")]
        load: Vec<String>,
        /// What to do when the table exists (fail, replace, append)
        #[arg(long)]
        if_exists: Option<ExistsPolicy>,
    },
    /// Upload several files in order, replacing each table; stops at the first failure
    Upload {
        /// SOURCE=TABLE pairs
        #[arg(required = true, value_name = "SOURCE=TABLE")]
        items: Vec<String>,
        /// Extractor override (KEY=VALUE), repeatable
        #[arg(long = "extract", value_name = "KEY=VALUE")]
        extract: Vec<String>,
    },
    /// Check configuration, source and destination connectivity
    Validate {
        /// Source CSV file
        source: String,
    },
    /// Show the configured pipeline
    Info,
    /// Run a SQL statement against the destination
    Query {
        /// SQL statement
        sql: String,
    },
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;

    match cli.command {
        Commands::Run {
            source,
            destination,
            extract,
            transform,
            load,
            if_exists,
        } => {
            let args = RunArgs {
                source,
                destination,
                extract,
                transform,
                load,
                if_exists,
            };
            run::handle_run(config, &args, format)
        }
        Commands::Upload { items, extract } => {
            upload::handle_upload(config, &UploadArgs { items, extract }, format)
        }
        Commands::Validate { source } => validate::handle_validate(config, &source, format),
        Commands::Info => info::handle_info(config, format),
        Commands::Query { sql } => query::handle_query(config, &sql, format),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    dispatch(cli).map_err(|e| anyhow::anyhow!(e.user_message()))
}
