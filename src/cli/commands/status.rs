use anyhow::Result;

use super::AppContext;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::OutputFormat;

pub async fn handle_status(ctx: &AppContext, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let index = ctx.open_index()?;
    let client = ctx.embedding_client()?;

    let (embedding_healthy, embedding_model) = match client.health_check().await {
        Ok(health) => (true, health.model_id),
        Err(e) => {
            tracing::debug!(error = %e, "embedding health check failed");
            (false, None)
        }
    };

    let status = StatusInfo {
        index_path: index
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        records: index.len(),
        dimension: index.dimension(),
        updated_at: index.updated_at(),
        embedding_url: client.base_url().to_string(),
        embedding_healthy,
        embedding_model,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_healthy {
        eprintln!();
        eprintln!(
            "Warning: embedding server not reachable at {}. Ingest and search need it.",
            status.embedding_url
        );
    }
    if status.records == 0 {
        eprintln!("Hint: index is empty. Load a corpus with: nutrag ingest <file.csv>");
    }

    Ok(())
}
