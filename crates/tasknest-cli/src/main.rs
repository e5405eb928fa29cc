//! tasknest - command-line front end over the local-first task store.
//!
//! Usage:
//!   tasknest task add "Write docs" --project 1
//!   tasknest task list --project 1
//!   tasknest bucket add "In progress"
//!   tasknest share enable --room team --password secret
//!   tasknest sync-demo

mod cli;
mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tasknest_core::app::StoreConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

const DEFAULT_DATA_DIR: &str = ".tasknest";

/// Contents of the `--config` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub store: StoreConfig,
}

impl CliConfig {
    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = match &cli.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };
    let data_dir = cli
        .data_dir
        .or(config.data_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    match cli.command {
        Commands::Task(args) => commands::run_task(args.command, &data_dir, config.store).await,
        Commands::Bucket(args) => {
            commands::run_bucket(args.command, &data_dir, config.store).await
        }
        Commands::Share(args) => commands::run_share(args.command, &data_dir).await,
        Commands::SyncDemo => commands::run_sync_demo(config.store).await,
    }
}
