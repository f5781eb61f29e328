use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{Config, DEFAULT_FIELDS};
use crate::database::{IndexManifest, VectorStore};
use crate::embeddings::OpenAiClient;
use crate::rag::{
    BuildMode, BuildReport, MIN_ANSWER_LENGTH, QueryResult, RagPipeline, Source, WebSearchAgent,
    answer_with_fallback,
};
use crate::table::{flatten, read_records};
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Boundary result: every failure becomes `{status: "error", message}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BuildReport>,
}

impl Response {
    #[inline]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            answer: None,
            sources: None,
            report: None,
        }
    }

    #[inline]
    pub fn indexed(report: BuildReport) -> Self {
        Self {
            status: Status::Success,
            message: Some("File ingested and indexed.".to_string()),
            answer: None,
            sources: None,
            report: Some(report),
        }
    }

    #[inline]
    pub fn answered(result: QueryResult) -> Self {
        Self {
            status: Status::Success,
            message: None,
            answer: Some(result.answer),
            sources: Some(result.sources),
            report: None,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<Result<BuildReport>> for Response {
    #[inline]
    fn from(result: Result<BuildReport>) -> Self {
        match result {
            Ok(report) => Self::indexed(report),
            Err(e) => {
                error!("Ingest failed: {}", e);
                Self::error(e.to_string())
            }
        }
    }
}

impl From<Result<QueryResult>> for Response {
    #[inline]
    fn from(result: Result<QueryResult>) -> Self {
        match result {
            Ok(result) => Self::answered(result),
            Err(e) => {
                error!("Query failed: {}", e);
                Self::error(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub persist_dir: PathBuf,
    pub mode: BuildMode,
}

pub struct AskOptions<'a> {
    pub persist_dir: PathBuf,
    /// Hand short answers to `web_agent` (or report that none is configured)
    pub web_fallback: bool,
    pub web_agent: Option<&'a dyn WebSearchAgent>,
    pub min_answer_length: usize,
}

impl AskOptions<'_> {
    #[inline]
    pub fn new(persist_dir: PathBuf) -> Self {
        Self {
            persist_dir,
            web_fallback: false,
            web_agent: None,
            min_answer_length: MIN_ANSWER_LENGTH,
        }
    }
}

/// Read a table file, flatten the selected fields and index the result
#[inline]
pub async fn ingest(
    pipeline: &RagPipeline,
    path: &Path,
    fields: &[String],
    options: &IngestOptions,
) -> Response {
    let bar = spinner(format!("Indexing {}", path.display()));
    let response = try_ingest(pipeline, path, fields, options).await.into();
    bar.finish_and_clear();
    response
}

async fn try_ingest(
    pipeline: &RagPipeline,
    path: &Path,
    fields: &[String],
    options: &IngestOptions,
) -> Result<BuildReport> {
    let fields = selected_fields(fields);
    info!("Ingesting {} with fields {:?}", path.display(), fields);

    let records = read_records(path)?;
    let units = flatten(&records, &fields);

    pipeline
        .build_index(&units, &options.persist_dir, options.mode)
        .await
}

/// Trimmed, non-empty field names; the defect defaults when none remain
#[inline]
pub fn selected_fields(fields: &[String]) -> Vec<String> {
    let selected: Vec<String> = fields
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    if selected.is_empty() {
        DEFAULT_FIELDS.iter().map(|f| (*f).to_string()).collect()
    } else {
        selected
    }
}

/// Answer a question from the persisted index
#[inline]
pub async fn ask(pipeline: &RagPipeline, question: &str, options: &AskOptions<'_>) -> Response {
    let bar = spinner("Searching records".to_string());
    let result = pipeline
        .query(question, &options.persist_dir)
        .await
        .and_then(|result| {
            if options.web_fallback {
                answer_with_fallback(
                    question,
                    result,
                    options.web_agent,
                    options.min_answer_length,
                )
            } else {
                Ok(result)
            }
        });
    bar.finish_and_clear();
    result.into()
}

/// Snapshot of a persist directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub persist_dir: PathBuf,
    pub exists: bool,
    pub entries: u64,
    pub manifest: Option<IndexManifest>,
}

#[inline]
pub async fn index_status(persist_dir: &Path) -> Result<IndexStatus> {
    if !persist_dir.is_dir() {
        return Ok(IndexStatus {
            persist_dir: persist_dir.to_path_buf(),
            exists: false,
            entries: 0,
            manifest: None,
        });
    }

    let entries = match VectorStore::open_existing(persist_dir).await {
        Ok(store) => store.count_embeddings().await?,
        Err(RagError::IndexNotFound(_)) => 0,
        Err(e) => return Err(e),
    };

    Ok(IndexStatus {
        persist_dir: persist_dir.to_path_buf(),
        exists: true,
        entries,
        manifest: IndexManifest::load(persist_dir)?,
    })
}

/// Print index and provider status
#[inline]
pub async fn show_status(config: &Config) -> anyhow::Result<()> {
    println!("{}", style("QC RAG Status Report").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}", style("Index:").bold());
    let persist_dir = config.persist_dir();
    match index_status(&persist_dir).await {
        Ok(status) if !status.exists => {
            println!("   Directory: {} (not built yet)", persist_dir.display());
            println!("   Use 'qc-rag ingest <file>' to build it.");
        }
        Ok(status) => {
            println!("   Directory: {}", status.persist_dir.display());
            println!("   Entries: {}", status.entries);
            match status.manifest {
                Some(manifest) => {
                    println!(
                        "   Embedding model: {} ({} dimensions)",
                        manifest.embedding_model, manifest.dimension
                    );
                    println!("   Created: {}", manifest.created_at.to_rfc3339());
                    println!("   Updated: {}", manifest.updated_at.to_rfc3339());
                }
                None => println!("   Manifest: missing"),
            }
        }
        Err(e) => println!("   {} {}", style("Failed to read index:").red(), e),
    }

    println!();
    println!("{}", style("Provider:").bold());
    println!("   Base URL: {}", config.provider.base_url);
    println!("   Chat model: {}", config.provider.chat_model);
    println!("   Embedding model: {}", config.provider.embedding_model);

    let client = OpenAiClient::new(&config.provider).context("Failed to create provider client")?;
    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task failed")?;
    match health {
        Ok(()) => println!("   {}", style("Reachable, both models available").green()),
        Err(e) => println!("   {} {:#}", style("Unhealthy:").yellow(), e),
    }

    Ok(())
}

/// Build the production pipeline from configuration
#[inline]
pub fn pipeline_from_config(config: &Config) -> anyhow::Result<RagPipeline> {
    let client =
        Arc::new(OpenAiClient::new(&config.provider).context("Failed to create provider client")?);
    Ok(RagPipeline::from_config(config, client.clone(), client))
}

/// Render a response for the terminal, or as JSON
#[inline]
pub fn print_response(response: &Response, json: bool) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(response).context("Failed to serialize response")?
        );
        return Ok(());
    }

    if !response.is_success() {
        eprintln!(
            "{} {}",
            style("Error:").red().bold(),
            response.message.as_deref().unwrap_or_default()
        );
        return Ok(());
    }

    if let Some(report) = &response.report {
        println!("{}", style("File ingested and indexed.").green());
        println!("   Rows: {}", report.units);
        println!("   Chunks indexed: {}", report.chunks_indexed);
        println!("   Total entries: {}", report.total_entries);
        println!("   Index: {}", report.persist_dir.display());
    }

    if let Some(answer) = &response.answer {
        println!("{}", answer);
    }

    if let Some(sources) = response.sources.as_ref().filter(|s| !s.is_empty()) {
        println!();
        println!("{}", style("Sources:").bold());
        for (rank, source) in sources.iter().enumerate() {
            println!(
                "{} row {} (score {:.3})",
                style(format!("[{}]", rank + 1)).cyan(),
                source.source_row,
                source.score
            );
            for line in source.snippet.lines() {
                println!("    {}", line);
            }
        }
    }

    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner();
    if let Ok(progress_style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(progress_style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
