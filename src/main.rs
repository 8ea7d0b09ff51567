//! regqa CLI entry point.

use anyhow::Result;
use clap::Parser;
use regqa::cli::{commands, Cli, Commands};
use regqa::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("regqa={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match cli.command {
        Commands::Build { documents, force } => {
            commands::run_build(documents, force, settings).await?;
        }

        Commands::Ask { question, options } => {
            commands::run_ask(&question, options, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            min_score,
        } => {
            commands::run_search(&query, limit, min_score, settings).await?;
        }

        Commands::Batch {
            input,
            output,
            start,
            limit,
        } => {
            commands::run_batch(input, output, start, limit, settings).await?;
        }

        Commands::Info => {
            commands::run_info(settings)?;
        }

        Commands::Clear => {
            commands::run_clear(settings)?;
        }

        Commands::Config { init } => {
            commands::run_config(init, settings)?;
        }
    }

    Ok(())
}
