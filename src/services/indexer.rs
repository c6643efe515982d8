//! Corpus ingestion: rows to records, records to vectors, vectors to the index.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::error::{IngestError, IngestionFieldError};
use crate::models::SourceRow;
use crate::services::embedding::EmbeddingProvider;
use crate::services::ingest::{RecordIngestor, read_rows};
use crate::services::vector_index::VectorIndex;
use crate::utils::{RetryPolicy, with_retry};

const DEFAULT_BATCH_SIZE: usize = 32;

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Rows that became records
    pub accepted_count: usize,
    pub skipped_count: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    /// Embedding calls repeated after transient failures
    pub embed_retries: u32,
    pub skipped: Vec<SkippedRow>,
    pub duration_ms: u64,
}

/// A row left out of the index and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub field: String,
    pub reason: String,
}

impl From<IngestionFieldError> for SkippedRow {
    fn from(e: IngestionFieldError) -> Self {
        Self {
            row: e.row,
            field: e.field,
            reason: e.reason,
        }
    }
}

pub struct Indexer {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    ingestor: RecordIngestor,
    batch_size: usize,
    retry: RetryPolicy,
}

impl Indexer {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        ingestor: RecordIngestor,
    ) -> Self {
        Self {
            provider,
            index,
            ingestor,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read a corpus file and ingest it.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let rows = read_rows(path)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "read corpus");
        self.ingest(rows).await
    }

    /// Ingest rows into the index.
    ///
    /// Rows missing a schema field are skipped and reported. Everything else
    /// is embedded and then inserted as a single batch, so either all
    /// accepted records land in the index or none do.
    pub async fn ingest<I>(&self, rows: I) -> Result<IngestReport, IngestError>
    where
        I: IntoIterator<Item = SourceRow>,
    {
        let start = Instant::now();
        let batch = self.ingestor.ingest_rows(rows);
        let records = batch.records;
        let skipped: Vec<SkippedRow> = batch.skipped.into_iter().map(SkippedRow::from).collect();

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        let mut embed_retries = 0;
        for (n, chunk) in texts.chunks(self.batch_size).enumerate() {
            let attempt = with_retry(&self.retry, || self.provider.embed(chunk)).await?;
            embed_retries += attempt.retries;
            let embedded = attempt.value;
            if embedded.len() != chunk.len() {
                return Err(IngestError::CountMismatch {
                    texts: chunk.len(),
                    vectors: embedded.len(),
                });
            }
            tracing::debug!(batch = n, size = chunk.len(), "embedded batch");
            vectors.extend(embedded);
        }

        let outcome = self.index.insert_batch(&records, &vectors)?;

        let report = IngestReport {
            accepted_count: records.len(),
            skipped_count: skipped.len(),
            inserted: outcome.inserted,
            replaced: outcome.replaced,
            unchanged: outcome.unchanged,
            embed_retries,
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            accepted = report.accepted_count,
            skipped = report.skipped_count,
            inserted = report.inserted,
            replaced = report.replaced,
            unchanged = report.unchanged,
            retries = report.embed_retries,
            model = self.provider.model_id(),
            "ingestion complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, IndexError};
    use crate::models::{RecordSchema, TextField};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Embeds by text length; fails the first `failures` calls.
    struct FlakyProvider {
        dimension: usize,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(dimension: usize, failures: usize) -> Self {
            Self {
                dimension,
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(EmbeddingError::Timeout);
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![1.0; self.dimension];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }

        fn model_id(&self) -> &str {
            "flaky"
        }
    }

    fn schema() -> RecordSchema {
        RecordSchema::new(vec![
            TextField::new("Food", "name"),
            TextField::new("Calories", "kcal"),
        ])
    }

    fn rows() -> Vec<SourceRow> {
        vec![
            SourceRow::new(0).with_field("name", "Apple").with_field("kcal", 95_i64),
            SourceRow::new(1).with_field("name", "Banana"),
            SourceRow::new(2).with_field("name", "Rice").with_field("kcal", 206_i64),
        ]
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_base_delay(Duration::from_millis(1))
    }

    fn indexer(provider: FlakyProvider, index: Arc<VectorIndex>) -> Indexer {
        Indexer::new(Arc::new(provider), index, RecordIngestor::new("test", schema()))
            .with_retry(fast_retry(3))
    }

    #[tokio::test]
    async fn test_ingest_counts_accepted_and_skipped() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let report = indexer(FlakyProvider::new(4, 0), index.clone())
            .with_batch_size(1)
            .ingest(rows())
            .await
            .unwrap();

        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped[0].row, 1);
        assert_eq!(report.skipped[0].field, "kcal");
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let indexer = indexer(FlakyProvider::new(4, 0), index.clone());
        indexer.ingest(rows()).await.unwrap();
        let again = indexer.ingest(rows()).await.unwrap();

        assert_eq!(again.inserted, 0);
        assert_eq!(again.unchanged, 2);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let report = indexer(FlakyProvider::new(4, 2), index.clone())
            .ingest(rows())
            .await
            .unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.embed_retries, 2);
    }

    #[tokio::test]
    async fn test_max_retries_tolerates_that_many_failures() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let report = indexer(FlakyProvider::new(4, 3), index.clone())
            .ingest(rows())
            .await
            .unwrap();
        assert_eq!(report.embed_retries, 3);
        assert_eq!(index.len(), 2);

        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let err = indexer(FlakyProvider::new(4, 4), index.clone())
            .ingest(rows())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(EmbeddingError::Timeout)));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_index_empty() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let err = indexer(FlakyProvider::new(4, 10), index.clone())
            .ingest(rows())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(EmbeddingError::Timeout)));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_change_rejects_whole_corpus() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        indexer(FlakyProvider::new(384, 0), index.clone())
            .ingest(rows())
            .await
            .unwrap();

        let more = vec![SourceRow::new(7).with_field("name", "Dal").with_field("kcal", 120_i64)];
        let err = indexer(FlakyProvider::new(128, 0), index.clone())
            .ingest(more)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Index(IndexError::DimensionMismatch {
                expected: 384,
                actual: 128,
                ..
            })
        ));
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_path_reads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("food.csv");
        std::fs::write(&path, "name,kcal\nApple,95\nRice,206\n").unwrap();

        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let report = indexer(FlakyProvider::new(4, 0), index.clone())
            .ingest_path(&path)
            .await
            .unwrap();
        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.skipped_count, 0);
    }

    #[tokio::test]
    async fn test_all_rows_skipped_is_not_an_error() {
        let index = Arc::new(VectorIndex::in_memory().unwrap());
        let report = indexer(FlakyProvider::new(4, 0), index.clone())
            .ingest(vec![SourceRow::new(0).with_field("name", "Water")])
            .await
            .unwrap();
        assert_eq!(report.accepted_count, 0);
        assert_eq!(report.skipped_count, 1);
        assert!(index.is_empty());
    }
}
