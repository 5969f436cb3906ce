use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crier::commands;
use crier::config::Config;
use crier::models::Platform;

#[derive(Parser)]
#[command(
    name = "crier",
    version,
    about = "Social posting automation daemon with scheduling, rotation and RSS fan-out",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file (environment variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon (posting tasks + maintenance)
    Run,

    /// Poll RSS feeds and fan posts out across platforms
    Rss {
        /// Run a single cycle instead of watching
        #[arg(long, default_value = "false")]
        once: bool,
    },

    /// Run one rotation-and-post cycle for a platform
    Post {
        /// Target platform (twitter, mastodon, bluesky)
        platform: Platform,
    },

    /// Show queues, pools, RSS cursors, and upcoming tasks
    Status,

    /// List scheduled tasks, or enable/disable one
    Tasks {
        /// Task id to act on
        id: Option<String>,

        /// Enable the given task
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable the given task
        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    if let Err(e) = crier::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    tracing::info!("crier starting");

    match cli.command {
        Commands::Run => {
            commands::run::run(config).await?;
        }

        Commands::Rss { once } => {
            commands::rss::watch(config, once).await?;
        }

        Commands::Post { platform } => {
            tracing::info!(platform = %platform, "Starting post command");
            commands::post::post(config, platform).await?;
        }

        Commands::Status => {
            commands::status::status(config).await?;
        }

        Commands::Tasks {
            id,
            enable,
            disable,
        } => {
            let action = if enable {
                commands::tasks::TaskAction::Enable
            } else if disable {
                commands::tasks::TaskAction::Disable
            } else {
                commands::tasks::TaskAction::List
            };
            commands::tasks::tasks(config, action, id).await?;
        }
    }

    tracing::info!("crier finished");
    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("crier=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("crier=info,warn")
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
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}
