mod config;
mod record;
mod schema;
mod search;
mod source;

pub use config::{
    APP_DIR, Config, DEFAULT_EMBEDDING_URL, DEFAULT_SOURCE, EMBEDDING_URL_ENV, EmbeddingConfig,
    IndexConfig, IngestConfig, SearchConfig,
};
pub use record::{DOC_INDEX_KEY, DocumentRecord, Metadata, MetadataValue};
pub use schema::{RecordSchema, TextField};
pub use search::{OutputFormat, RetrievalResult, SearchQuery, SearchResults};
pub use source::{SourceFormat, SourceRow};
