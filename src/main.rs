use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use nutri_rag::cli::commands::{
    AppContext, handle_config, handle_ingest, handle_search, handle_status,
};
use nutri_rag::cli::{Cli, Commands};
use nutri_rag::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "nutri_rag=debug"
    } else {
        "nutri_rag=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let default_format = Config::load_from(cli.config.as_deref())
        .map(|c| c.search.default_format)
        .unwrap_or_default();
    let format = cli.format.unwrap_or(default_format);

    tokio::select! {
        result = run_command(cli, format) => {
            result?;
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, stopping.");
        }
    }

    Ok(())
}

async fn run_command(cli: Cli, format: OutputFormat) -> Result<()> {
    let verbose = cli.verbose;
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(cmd) => handle_config(cmd, config_path, format, verbose).await?,
        Commands::Ingest(args) => {
            let ctx = AppContext::load(config_path)?;
            handle_ingest(args, &ctx, format, verbose).await?;
        }
        Commands::Search(args) => {
            let ctx = AppContext::load(config_path)?;
            handle_search(args, &ctx, format, verbose).await?;
        }
        Commands::Status => {
            let ctx = AppContext::load(config_path)?;
            handle_status(&ctx, format, verbose).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
