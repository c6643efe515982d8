use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{EmbeddingProvider, HttpEmbeddingClient, Retriever, VectorIndex};

/// Loaded configuration, with constructors for the index, embedding client
/// and retriever a command asks for.
pub struct AppContext {
    pub config: Config,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_from(config_path).with_context(|| match config_path {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config".to_string(),
        })?;
        Ok(Self { config })
    }

    pub fn index_path(&self) -> Result<PathBuf> {
        self.config
            .index
            .resolved_path()
            .context("failed to resolve index path")
    }

    pub fn open_index(&self) -> Result<Arc<VectorIndex>> {
        let path = self.index_path()?;
        let index = VectorIndex::open(&path)
            .with_context(|| format!("failed to open index at {}", path.display()))?;
        Ok(Arc::new(index))
    }

    pub fn embedding_client(&self) -> Result<HttpEmbeddingClient> {
        HttpEmbeddingClient::new(&self.config.embedding).context("failed to create embedding client")
    }

    pub fn retriever(&self) -> Result<Retriever> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(self.embedding_client()?);
        Ok(Retriever::new(provider, self.open_index()?)
            .with_timeout(Duration::from_secs(self.config.search.embed_timeout_secs)))
    }
}
