//! Source model for tabular corpus input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::record::MetadataValue;

/// Format of a tabular corpus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl SourceFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        ext.parse().ok()
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Csv => write!(f, "csv"),
            SourceFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "jsonl" | "ndjson" => Ok(SourceFormat::Jsonl),
            _ => Err(format!("unknown source format: {}", s)),
        }
    }
}

/// One row of a tabular source, fields kept in source column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// Zero-based position of the row in its source
    pub ordinal: usize,
    pub fields: Vec<(String, MetadataValue)>,
}

impl SourceRow {
    pub fn new(ordinal: usize) -> Self {
        Self {
            ordinal,
            fields: Vec::new(),
        }
    }

    /// Append a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Look up a field by its column name.
    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}
