// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::Parser;
use hub_config::{load_config, resolve_port, validate_config};
use hub_daemon::{build_app, build_state};
use hub_driver::Driver;
use hub_driver_mock::MockDriver;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hub-daemon", version, about = "Authenticated object-storage gateway hub")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("load configuration")?;

    for warning in validate_config(&config).context("validate configuration")? {
        warn!(%warning, "configuration warning");
    }

    let driver = Arc::new(MockDriver::new(config.read_url.clone()));
    driver.ensure_initialized().await.context("initialize storage driver")?;

    let port = resolve_port();
    let state = Arc::new(build_state(config, driver));
    let app = build_app(state);

    let bind = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    info!(%bind, "hub-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
