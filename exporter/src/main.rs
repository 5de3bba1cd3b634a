//! Nginx Request Exporter Binary
//!
//! Entry point for the exporter server.

#![deny(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use exporter::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    exporter::run_server(config).await
}
