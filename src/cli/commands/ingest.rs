//! Ingest command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::AppContext;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;
use crate::services::{EmbeddingProvider, Indexer, RecordIngestor};
use crate::utils::RetryPolicy;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// CSV or JSON Lines file to ingest
    #[arg(required = true)]
    pub file: PathBuf,

    /// Corpus label used to derive stable record ids
    #[arg(long, short = 's')]
    pub source: Option<String>,

    /// Override the embedding batch size
    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,
}

pub async fn handle_ingest(
    args: IngestArgs,
    ctx: &AppContext,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    if !args.file.is_file() {
        anyhow::bail!("file does not exist: {}", args.file.display());
    }

    let config = &ctx.config;
    let formatter = get_formatter(format);
    let source = args.source.as_deref().unwrap_or(&config.ingest.source);
    let schema = config.ingest.schema();
    let batch_size = args
        .batch_size
        .unwrap_or(config.embedding.batch_size as usize);

    if verbose {
        eprintln!("Ingesting: {}", args.file.display());
        eprintln!("  Source: {source}");
        let columns: Vec<&str> = schema.required_columns().collect();
        eprintln!("  Fields: {}", columns.join(", "));
        eprintln!("  Batch size: {batch_size}");
    }

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(ctx.embedding_client()?);
    let index = ctx.open_index()?;
    let indexer = Indexer::new(provider, index, RecordIngestor::new(source, schema))
        .with_batch_size(batch_size)
        .with_retry(RetryPolicy::new(config.embedding.max_retries));

    let spinner = spinner(format, verbose);
    spinner.set_message(format!("Embedding rows from {}", args.file.display()));
    let result = indexer.ingest_path(&args.file).await;
    spinner.finish_and_clear();

    let report = result.with_context(|| format!("failed to ingest {}", args.file.display()))?;
    print!("{}", formatter.format_ingest_report(&report));

    Ok(())
}

/// A spinner on stderr, hidden when the output is meant for machines.
fn spinner(format: OutputFormat, verbose: bool) -> ProgressBar {
    if format == OutputFormat::Json && !verbose {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
