use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use super::AppContext;
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, SearchQuery, SearchResults};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Question or search text")]
    pub query: String,

    #[arg(long = "top-k", short = 'k', help = "Maximum number of results to return")]
    pub top_k: Option<usize>,

    #[arg(long, help = "Drop results below this similarity (-1.0 to 1.0)")]
    pub min_score: Option<f32>,
}

pub async fn handle_search(
    args: SearchArgs,
    ctx: &AppContext,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = &ctx.config;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let mut query = SearchQuery::new(args.query.trim())
        .with_top_k(args.top_k.unwrap_or(config.search.default_top_k));
    if let Some(score) = args.min_score.or(config.search.default_min_score) {
        query = query.with_min_score(score);
    }

    if query.query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }
    if query.top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }
    if let Some(score) = query.min_score
        && !(-1.0..=1.0).contains(&score)
    {
        anyhow::bail!("min-score must be between -1.0 and 1.0");
    }

    if verbose {
        eprintln!("Query: \"{}\"", query.query);
        eprintln!("  Top k: {}", query.top_k);
        if let Some(score) = query.min_score {
            eprintln!("  Min score: {score:.3}");
        }
    }

    let retriever = ctx.retriever()?;
    let mut results = retriever
        .retrieve(&query.query, query.top_k)
        .await
        .context("search failed")?;
    if let Some(score) = query.min_score {
        results.retain(|r| r.similarity >= score);
    }

    let duration_ms = start_time.elapsed().as_millis() as u64;
    if verbose {
        eprintln!("  Total: {duration_ms}ms");
        eprintln!();
    }

    let search_results = SearchResults::new(query.query, results, duration_ms);
    print!("{}", formatter.format_search_results(&search_results));

    Ok(())
}
