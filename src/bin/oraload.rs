//! oraload CLI - connection diagnostics and column type resolution
//!
//! Usage:
//!   oraload check [--env-file <path>] [--timeout <secs>]
//!   oraload config [--env-file <path>]
//!   oraload resolve <field> [--tag <tag>] [--json-type <type>] [--format <fmt>] [--max-length <n>] [--sample <json>]
//!   oraload columns <schema.json>
//!
//! Examples:
//!   oraload check --env-file .env
//!   oraload resolve serial_nbr_set --json-type string --max-length 30
//!   oraload columns catalog/orders.schema.json

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use oraload::services::database::{
    ConnectionConfig, ConnectionFactory, ConnectionManager, load_env_file,
};
use oraload::services::ddl::{SchemaFragment, SchemaMapper, TypeInferenceEngine};

#[derive(Parser)]
#[command(name = "oraload")]
#[command(about = "Oracle connection diagnostics and schema-to-DDL type mapping")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a session and print a JSON connection report
    Check {
        /// Read ORACLE_* settings from this file instead of the environment
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Give up connecting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the effective connection settings (password redacted)
    Config {
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Resolve the column type for one field
    Resolve {
        /// Source field name
        field: String,

        /// Explicit metadata type tag
        #[arg(long)]
        tag: Option<String>,

        /// JSON-schema type of the field
        #[arg(long)]
        json_type: Option<String>,

        /// JSON-schema format of the field
        #[arg(long)]
        format: Option<String>,

        /// JSON-schema maxLength of the field
        #[arg(long)]
        max_length: Option<u32>,

        /// Sample value as JSON (e.g. '"2024-03-01"' or 42)
        #[arg(long)]
        sample: Option<String>,
    },

    /// Print column definitions for every property of a JSON schema file
    Columns {
        /// Path to the JSON schema
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { env_file, timeout } => cmd_check(env_file, timeout),
        Commands::Config { env_file } => cmd_config(env_file),
        Commands::Resolve {
            field,
            tag,
            json_type,
            format,
            max_length,
            sample,
        } => cmd_resolve(field, tag, json_type, format, max_length, sample),
        Commands::Columns { file } => cmd_columns(file),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(env_file: Option<PathBuf>) -> Result<ConnectionConfig> {
    let config = match env_file {
        Some(path) => {
            let vars = load_env_file(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            ConnectionConfig::from_env_map(&vars)?
        }
        None => ConnectionConfig::from_process_env()?,
    };
    Ok(config)
}

fn cmd_check(env_file: Option<PathBuf>, timeout: Option<u64>) -> Result<ExitCode> {
    let config = load_config(env_file)?;
    let manager = ConnectionManager::new(ConnectionFactory::create(config)?);

    smol::block_on(async {
        let report = match timeout {
            Some(secs) => {
                manager
                    .test_connection_within(Duration::from_secs(secs))
                    .await
            }
            None => manager.test_connection().await,
        };
        manager.close().await?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok::<_, anyhow::Error>(if report.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    })
}

fn cmd_config(env_file: Option<PathBuf>) -> Result<ExitCode> {
    let config = load_config(env_file)?;
    for (key, value) in config.to_env_map() {
        println!("{}={}", key, value);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_resolve(
    field: String,
    tag: Option<String>,
    json_type: Option<String>,
    format: Option<String>,
    max_length: Option<u32>,
    sample: Option<String>,
) -> Result<ExitCode> {
    let schema = if json_type.is_some() || format.is_some() || max_length.is_some() {
        Some(SchemaFragment {
            types: json_type.into_iter().collect(),
            format,
            max_length,
        })
    } else {
        None
    };

    let sample = sample
        .map(|raw| {
            serde_json::from_str::<serde_json::Value>(&raw)
                .map_err(|e| anyhow!("--sample is not valid JSON: {}", e))
        })
        .transpose()?;

    let resolved = TypeInferenceEngine::new().resolve(
        &field,
        tag.as_deref(),
        schema.as_ref(),
        sample.as_ref(),
    );
    println!("{}", resolved);
    Ok(ExitCode::SUCCESS)
}

fn cmd_columns(file: PathBuf) -> Result<ExitCode> {
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let schema: serde_json::Value = serde_json::from_str(&source)
        .with_context(|| format!("parsing {}", file.display()))?;

    let columns = SchemaMapper::new().map_properties(&schema);
    if columns.is_empty() {
        return Err(anyhow!("{} has no properties", file.display()));
    }
    println!("{}", SchemaMapper::render_columns(&columns));
    Ok(ExitCode::SUCCESS)
}
