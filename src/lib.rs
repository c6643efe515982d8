//! Retrieval core for answering nutrition questions from a food corpus.
//!
//! Tabular rows are turned into [`models::DocumentRecord`]s, embedded through
//! an [`services::EmbeddingProvider`], and stored in a persistent
//! [`services::VectorIndex`]. A [`services::Retriever`] embeds a question and
//! returns the most similar records with their cosine similarity.

pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::AppError;
pub use models::{Config, OutputFormat};
