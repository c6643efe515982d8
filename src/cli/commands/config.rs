use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, EMBEDDING_URL_ENV, IndexConfig, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, help = "Overwrite an existing config file")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration and index file paths")]
    Path,
}

/// Config commands take the raw `--config` path: `init` must work before
/// the file exists.
pub async fn handle_config(
    cmd: ConfigCommand,
    config_path: Option<&Path>,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    match cmd {
        ConfigCommand::Init { force } => handle_init(config_path, force, format),
        ConfigCommand::Show => handle_show(config_path, format),
        ConfigCommand::Path => handle_path(config_path),
    }
}

fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
    }
}

fn handle_init(config_path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = target_path(config_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save_to(&path)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = Config::load_from(config_path).context("failed to load config")?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let path = target_path(config_path)?;
    if path.exists() {
        println!("# Config: {}", path.display());
    } else {
        println!("# Config: defaults ({} not found)", path.display());
    }
    if std::env::var(EMBEDDING_URL_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        println!("# embedding.url overridden by {EMBEDDING_URL_ENV}");
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to render config")?
    );
    Ok(())
}

fn handle_path(config_path: Option<&Path>) -> Result<()> {
    let path = target_path(config_path)?;
    let state = if path.exists() { "active" } else { "would be" };
    println!("Config file ({state}): {}", path.display());

    let index_path = match Config::load_from(config_path) {
        Ok(config) => config.index.resolved_path().ok(),
        Err(_) => IndexConfig::default_path(),
    };
    if let Some(index_path) = index_path {
        let state = if index_path.exists() { "active" } else { "would be" };
        println!("Index file ({state}): {}", index_path.display());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        }
    }
    Ok(())
}
