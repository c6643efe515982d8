use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key holding the row's position in its source.
pub const DOC_INDEX_KEY: &str = "doc_index";

/// Field name to scalar value, as carried from source row to result.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A schema-less scalar metadata value.
///
/// Serialized untagged, so JSON output shows plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Type a raw tabular cell.
    ///
    /// A cell becomes `Bool`, `Integer` or `Float` only when the typed value
    /// displays exactly as the cell text; everything else stays `Text`.
    pub fn infer(raw: &str) -> Self {
        match raw {
            "true" => return MetadataValue::Bool(true),
            "false" => return MetadataValue::Bool(false),
            _ => {}
        }

        if let Ok(n) = raw.parse::<i64>()
            && n.to_string() == raw
        {
            return MetadataValue::Integer(n);
        }

        if let Ok(f) = raw.parse::<f64>()
            && f.is_finite()
            && f.to_string() == raw
        {
            return MetadataValue::Float(f);
        }

        MetadataValue::Text(raw.to_string())
    }

    /// True for text values that are empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        matches!(self, MetadataValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(n) => write!(f, "{}", n),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Integer(n)
    }
}

impl From<f64> for MetadataValue {
    fn from(x: f64) -> Self {
        MetadataValue::Float(x)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// A normalized, embeddable document built from one source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub checksum: String,
}

impl DocumentRecord {
    /// Stable identifier of a corpus source, derived from its label.
    pub fn source_id(source: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(source.as_bytes());
        hex::encode(&hash[..16])
    }

    /// Stable record identifier for the row at `ordinal` of a source.
    pub fn generate_id(source_id: &str, ordinal: usize) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", source_id, ordinal);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn new(id: String, text: String, metadata: Metadata) -> Self {
        let checksum = crate::utils::calculate_checksum(&text);
        Self {
            id,
            text,
            metadata,
            checksum,
        }
    }
}
