//! Error types for the nutrition retrieval core.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// A source row that could not be turned into a document record.
///
/// Row-scoped and recoverable: the row is skipped and counted, ingestion
/// continues with the next row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row}: field '{field}' {reason}")]
pub struct IngestionFieldError {
    pub row: usize,
    pub field: String,
    pub reason: String,
}

impl IngestionFieldError {
    pub fn missing(row: usize, field: impl Into<String>) -> Self {
        Self {
            row,
            field: field.into(),
            reason: "is missing or blank".to_string(),
        }
    }
}

/// Errors related to reading a tabular corpus.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {0} is not a JSON object")]
    NotAnObject(usize),

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.contains("unavailable")
                    || msg.contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("dimension mismatch at position {position}: index has {expected}, vector has {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("count mismatch: {records} records but {vectors} vectors")]
    CountMismatch { records: usize, vectors: usize },

    #[error("vector at position {0} is empty")]
    EmptyVector(usize),

    #[error("vector at position {0} contains non-finite values")]
    NonFiniteVector(usize),

    #[error("top_k must be a positive integer")]
    InvalidTopK,

    #[error("index storage is corrupt: {0}")]
    StorageCorruption(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the retriever.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding provider failed or timed out; retrieval was not attempted.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

impl RetrievalError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RetrievalError::Unavailable(_))
    }
}

/// Errors related to corpus ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("embedding provider returned {vectors} vectors for {texts} texts")]
    CountMismatch { texts: usize, vectors: usize },
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let err = IngestionFieldError::missing(4, "Dish Name");
        assert_eq!(err.to_string(), "row 4: field 'Dish Name' is missing or blank");
    }

    #[test]
    fn test_embedding_error_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ConnectionError("refused".into()).is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 400: bad input".into()).is_retryable());
        assert!(!EmbeddingError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_retrieval_unavailable_is_distinct() {
        assert!(RetrievalError::Unavailable("down".into()).is_unavailable());
        assert!(!RetrievalError::Index(IndexError::InvalidTopK).is_unavailable());
    }
}
