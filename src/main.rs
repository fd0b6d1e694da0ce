mod config;
mod data_aquisition;
mod gui;
mod layout;
mod network;
mod parsers;
mod topology;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, Args};
use gui::app;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from(Args::parse());
    tracing::info!(bootstrap = %config.bootstrap, "starting");

    let rt = Arc::new(tokio::runtime::Runtime::new().context("failed to start the tokio runtime")?);
    app::main(rt, config).map_err(|e| anyhow::anyhow!("gui exited with an error: {e}"))
}
