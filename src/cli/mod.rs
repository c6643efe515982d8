//! Command-line interface for the nutrition retrieval index.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ingest a food corpus and search it by meaning.
#[derive(Debug, Parser)]
#[command(name = "nutrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "NUTRAG_CONFIG",
        help = "Path to config file"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a CSV or JSON Lines corpus into the index
    Ingest(commands::IngestArgs),

    /// Retrieve the records most similar to a question
    Search(commands::SearchArgs),

    /// Show index and embedding server status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
