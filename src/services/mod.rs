mod embedding;
mod indexer;
mod ingest;
mod retriever;
mod vector_index;

pub use embedding::{EmbeddingProvider, HealthResponse, HttpEmbeddingClient, check_uniform_dimension};
pub use indexer::{IngestReport, Indexer, SkippedRow};
pub use ingest::{IngestBatch, RecordIngestor, parse_csv, parse_jsonl, read_rows};
pub use retriever::Retriever;
pub use vector_index::{IndexSnapshot, IndexedRecord, InsertOutcome, VectorIndex};
