use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ercrowd::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "ercrowd",
    version,
    about = "Emergency-room congestion ingestion for Sicilian hospitals",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to `logging.format`
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic scheduler until Ctrl-C
    Serve,

    /// Run the whole fleet once (subject to the manual cooldown)
    Run,

    /// Scrape a single hospital
    RunHospital {
        /// Internal hospital id
        #[arg(long)]
        id: i64,
    },

    /// Load static hospital metadata into the directory
    Seed {
        /// Hospital directory file
        #[arg(short, long, default_value = "hospitals.toml")]
        file: PathBuf,
    },

    /// Show current status and recent history of a hospital
    Status {
        /// Internal hospital id
        #[arg(long)]
        id: i64,

        /// Number of history rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List registered sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    match cli.command {
        Commands::Serve => {
            tracing::info!(interval_secs = config.scraper.interval_secs, "Starting serve command");
            commands::serve(config).await?;
        }

        Commands::Run => {
            tracing::info!("Starting manual fleet run");
            commands::run(config).await?;
        }

        Commands::RunHospital { id } => {
            tracing::info!(hospital_id = id, "Starting single hospital run");
            commands::run_hospital(config, id).await?;
        }

        Commands::Seed { file } => {
            tracing::info!(file = %file.display(), "Starting seed command");
            commands::seed(config, &file).await?;
        }

        Commands::Status { id, limit } => {
            commands::status(config, id, limit).await?;
        }

        Commands::Sources => {
            commands::sources();
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("ercrowd=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("ercrowd={level},warn"))
        })
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
