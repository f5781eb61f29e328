use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use qc_rag::commands::{
    AskOptions, IngestOptions, ask, ingest, pipeline_from_config, print_response, show_status,
};
use qc_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use qc_rag::rag::BuildMode;

#[derive(Parser)]
#[command(name = "qc-rag")]
#[command(about = "Question answering over manufacturing quality-control records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider and index settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Read a table file and add its rows to the index
    Ingest {
        /// Spreadsheet, CSV, JSON or JSON Lines file
        file: PathBuf,
        /// Comma separated columns to index, in order
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Index directory (defaults to the configured one)
        #[arg(long)]
        persist_dir: Option<PathBuf>,
        /// Drop existing entries instead of appending
        #[arg(long)]
        replace: bool,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a question about the indexed records
    Query {
        question: String,
        /// Report when the answer is too short for a web search fallback
        #[arg(long)]
        web_fallback: bool,
        /// Index directory (defaults to the configured one)
        #[arg(long)]
        persist_dir: Option<PathBuf>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index and provider status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir()?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&config_dir)?;
        } else {
            run_interactive_config(&config_dir)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load_with_env(&config_dir)?;
    config.validate().context("Invalid configuration")?;

    let response = match cli.command {
        Commands::Ingest {
            file,
            fields,
            persist_dir,
            replace,
            json,
        } => {
            let fields = if fields.is_empty() {
                config.index.fields.clone()
            } else {
                fields
            };
            let options = IngestOptions {
                persist_dir: persist_dir.unwrap_or_else(|| config.persist_dir()),
                mode: if replace {
                    BuildMode::Replace
                } else {
                    BuildMode::Append
                },
            };
            let pipeline = pipeline_from_config(&config)?;
            let response = ingest(&pipeline, &file, &fields, &options).await;
            print_response(&response, json)?;
            response
        }
        Commands::Query {
            question,
            web_fallback,
            persist_dir,
            json,
        } => {
            let mut options = AskOptions::new(persist_dir.unwrap_or_else(|| config.persist_dir()));
            options.web_fallback = web_fallback;
            options.min_answer_length = config.index.min_answer_length;
            let pipeline = pipeline_from_config(&config)?;
            let response = ask(&pipeline, &question, &options).await;
            print_response(&response, json)?;
            response
        }
        Commands::Status => {
            show_status(&config).await?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Config { .. } => return Ok(ExitCode::SUCCESS),
    };

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
