//! Query-time retrieval: embed the query, then rank the index.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::RetrievalError;
use crate::models::RetrievalResult;
use crate::services::embedding::EmbeddingProvider;
use crate::services::vector_index::{VectorIndex, check_vector};

const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only search over a shared [`VectorIndex`].
///
/// Cheap to clone and safe to share across tasks. The embedding call is not
/// retried; a slow or failing provider surfaces as
/// [`RetrievalError::Unavailable`] so callers can degrade gracefully.
#[derive(Clone)]
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self {
            provider,
            index,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, embed_timeout: Duration) -> Self {
        self.embed_timeout = embed_timeout;
        self
    }

    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if query_text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query text is empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RetrievalError::InvalidQuery(
                "top_k must be at least 1".to_string(),
            ));
        }

        let query_vector = self.embed_query(query_text).await?;
        let results = self.index.query(&query_vector, top_k)?;

        tracing::debug!(
            top_k,
            returned = results.len(),
            best = results.first().map(|r| r.similarity),
            "retrieved"
        );
        Ok(results)
    }

    async fn embed_query(&self, query_text: &str) -> Result<Vec<f32>, RetrievalError> {
        let texts = [query_text.to_string()];
        let embedded = timeout(self.embed_timeout, self.provider.embed(&texts))
            .await
            .map_err(|_| {
                RetrievalError::Unavailable(format!(
                    "embedding provider did not answer within {:?}",
                    self.embed_timeout
                ))
            })?
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        let count = embedded.len();
        let Ok([vector]) = <[Vec<f32>; 1]>::try_from(embedded) else {
            return Err(RetrievalError::Unavailable(format!(
                "expected one query embedding, got {count}"
            )));
        };
        check_vector(0, &vector)
            .map_err(|e| RetrievalError::Unavailable(format!("unusable query embedding: {e}")))?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::{DocumentRecord, Metadata};
    use async_trait::async_trait;

    /// Returns a fixed vector for every text, or a configured failure.
    struct FixedProvider {
        vector: Vec<f32>,
        per_text: usize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl FixedProvider {
        fn new(vector: Vec<f32>) -> Self {
            Self {
                vector,
                per_text: 1,
                delay: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(EmbeddingError::ConnectionError("refused".into()));
            }
            Ok(vec![self.vector.clone(); texts.len() * self.per_text])
        }

        fn model_id(&self) -> &str {
            "fixed"
        }
    }

    fn index() -> Arc<VectorIndex> {
        let index = VectorIndex::in_memory().unwrap();
        let records = [
            DocumentRecord::new("apple".into(), "Food: Apple".into(), Metadata::new()),
            DocumentRecord::new("rice".into(), "Food: Rice".into(), Metadata::new()),
        ];
        index
            .insert_batch(&records, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_similarity() {
        let retriever = Retriever::new(Arc::new(FixedProvider::new(vec![0.1, 0.9])), index());
        let results = retriever.retrieve("boiled rice", 2).await.unwrap();
        assert_eq!(results[0].id, "rice");
        assert_eq!(results[1].id, "apple");
    }

    #[tokio::test]
    async fn test_invalid_queries() {
        let retriever = Retriever::new(Arc::new(FixedProvider::new(vec![1.0, 0.0])), index());
        assert!(matches!(
            retriever.retrieve("   ", 3).await,
            Err(RetrievalError::InvalidQuery(_))
        ));
        assert!(matches!(
            retriever.retrieve("apple", 0).await,
            Err(RetrievalError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_is_unavailable() {
        let provider = FixedProvider {
            fail: true,
            ..FixedProvider::new(vec![1.0, 0.0])
        };
        let retriever = Retriever::new(Arc::new(provider), index());
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_provider_timeout_is_unavailable() {
        let provider = FixedProvider {
            delay: Some(Duration::from_millis(500)),
            ..FixedProvider::new(vec![1.0, 0.0])
        };
        let retriever = Retriever::new(Arc::new(provider), index())
            .with_timeout(Duration::from_millis(20));
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_wrong_vector_count_is_unavailable() {
        let provider = FixedProvider {
            per_text: 2,
            ..FixedProvider::new(vec![1.0, 0.0])
        };
        let retriever = Retriever::new(Arc::new(provider), index());
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_nan_query_vector_is_unavailable() {
        let retriever =
            Retriever::new(Arc::new(FixedProvider::new(vec![f32::NAN, f32::NAN])), index());
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_empty_query_vector_is_unavailable_even_on_empty_index() {
        let empty = Arc::new(VectorIndex::in_memory().unwrap());
        let retriever = Retriever::new(Arc::new(FixedProvider::new(vec![])), empty);
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_index_error() {
        let retriever = Retriever::new(Arc::new(FixedProvider::new(vec![1.0, 0.0, 0.0])), index());
        let err = retriever.retrieve("apple", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Index(_)));
    }
}
