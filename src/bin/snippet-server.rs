// ABOUTME: Host process owning the database handle for the snippet server core
// ABOUTME: Connects and migrates at startup, closes the pool on shutdown signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Snippet Server Contributors

//! # Snippet Server Binary
//!
//! Opens the database, runs migrations and keeps the connection pool alive
//! until interrupted. The HTTP layer attaches to the same handle.

use anyhow::Result;
use clap::Parser;
use snippet_server::{
    config::{DatabaseConfig, DatabaseUrl},
    database::Database,
    logging::{LogFormat, LoggingConfig},
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "snippet-server")]
#[command(about = "Snippet server - OAuth identity reconciliation backend")]
pub struct Args {
    /// Database URL, overrides `DATABASE_URL`
    #[arg(long)]
    database_url: Option<String>,

    /// Log format (json, pretty, compact), overrides `LOG_FORMAT`
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = args.log_format {
        logging.format = format;
    }
    logging.init()?;

    let mut config = DatabaseConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.url = DatabaseUrl::parse_url(&url)?;
    }

    let database = Database::connect(&config).await?;
    info!(url = %config.url, "Snippet server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    database.close().await;
    Ok(())
}
