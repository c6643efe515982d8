use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{DOC_INDEX_KEY, OutputFormat, SearchResults};
use crate::services::IngestReport;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_ingest_report(&self, report: &IngestReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub index_path: String,
    pub records: usize,
    pub dimension: Option<usize>,
    pub updated_at: Option<String>,
    pub embedding_url: String,
    pub embedding_healthy: bool,
    pub embedding_model: Option<String>,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        let _ = writeln!(output, "Search results for: \"{}\"", results.query);
        let _ = writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        );

        for (i, result) in results.results.iter().enumerate() {
            let _ = writeln!(output, "{}. [Similarity: {:.3}]", i + 1, result.similarity);
            if let Some(row) = result.metadata.get(DOC_INDEX_KEY) {
                let _ = writeln!(output, "   Row: {row}");
            }
            let _ = writeln!(output, "   ---");
            for line in result.text.lines() {
                let _ = writeln!(output, "   {line}");
            }
            let _ = writeln!(output);
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Ingestion Complete");
        let _ = writeln!(output, "------------------");
        let _ = writeln!(output, "Rows accepted:  {}", report.accepted_count);
        let _ = writeln!(output, "Rows skipped:   {}", report.skipped_count);
        let _ = writeln!(output, "Inserted:       {}", report.inserted);
        let _ = writeln!(output, "Replaced:       {}", report.replaced);
        let _ = writeln!(output, "Unchanged:      {}", report.unchanged);
        if report.embed_retries > 0 {
            let _ = writeln!(output, "Embed retries:  {}", report.embed_retries);
        }
        let _ = writeln!(output, "Duration:       {}ms", report.duration_ms);

        if !report.skipped.is_empty() {
            let _ = writeln!(output);
            let _ = writeln!(output, "Skipped rows:");
            for skipped in &report.skipped {
                let _ = writeln!(
                    output,
                    "  row {}: '{}' {}",
                    skipped.row, skipped.field, skipped.reason
                );
            }
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Status");
        let _ = writeln!(output, "------");

        let _ = writeln!(output, "Index:         {}", status.index_path);
        let _ = writeln!(output, "  Records:     {}", status.records);
        match status.dimension {
            Some(dim) => {
                let _ = writeln!(output, "  Dimension:   {dim}");
            }
            None => {
                let _ = writeln!(output, "  Dimension:   (not set)");
            }
        }
        if let Some(ref updated) = status.updated_at {
            let _ = writeln!(output, "  Updated:     {updated}");
        }
        let _ = writeln!(output);

        let health = if status.embedding_healthy {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        let _ = writeln!(output, "Embedding:     {} {}", status.embedding_url, health);
        if let Some(ref model) = status.embedding_model {
            let _ = writeln!(output, "  Model:       {model}");
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut out =
            rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
        out.push('\n');
        out
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        self.render(results)
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        self.render(report)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "index": {
                "path": status.index_path,
                "records": status.records,
                "dimension": status.dimension,
                "updated_at": status.updated_at,
            },
            "embedding": {
                "url": status.embedding_url,
                "healthy": status.embedding_healthy,
                "model": status.embedding_model,
            }
        });
        self.render(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        let _ = writeln!(output, "## Search Results\n");
        let _ = writeln!(output, "**Query:** `{}`\n", results.query);
        let _ = writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        );

        for (i, result) in results.results.iter().enumerate() {
            let _ = writeln!(
                output,
                "### {}. Similarity: {:.3}\n",
                i + 1,
                result.similarity
            );
            let _ = writeln!(output, "```");
            let _ = writeln!(output, "{}", result.text);
            let _ = writeln!(output, "```\n");
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Ingestion Complete\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Rows accepted | {} |", report.accepted_count);
        let _ = writeln!(output, "| Rows skipped | {} |", report.skipped_count);
        let _ = writeln!(output, "| Inserted | {} |", report.inserted);
        let _ = writeln!(output, "| Replaced | {} |", report.replaced);
        let _ = writeln!(output, "| Unchanged | {} |", report.unchanged);
        let _ = writeln!(output, "| Embed retries | {} |", report.embed_retries);
        let _ = writeln!(output, "| Duration | {}ms |", report.duration_ms);

        if !report.skipped.is_empty() {
            let _ = writeln!(output, "\n### Skipped rows\n");
            for skipped in &report.skipped {
                let _ = writeln!(
                    output,
                    "- row {}: `{}` {}",
                    skipped.row, skipped.field, skipped.reason
                );
            }
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "## Status\n");
        let _ = writeln!(output, "### Index\n");
        let _ = writeln!(output, "- **Path:** `{}`", status.index_path);
        let _ = writeln!(output, "- **Records:** {}", status.records);
        if let Some(dim) = status.dimension {
            let _ = writeln!(output, "- **Dimension:** {dim}");
        }
        if let Some(ref updated) = status.updated_at {
            let _ = writeln!(output, "- **Updated:** {updated}");
        }
        let _ = writeln!(output);

        let health = if status.embedding_healthy { "✅" } else { "❌" };
        let _ = writeln!(output, "### Embedding Server {}\n", health);
        let _ = writeln!(output, "- **URL:** `{}`", status.embedding_url);
        if let Some(ref model) = status.embedding_model {
            let _ = writeln!(output, "- **Model:** {model}");
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
