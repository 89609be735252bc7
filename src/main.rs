// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! `integration-engine` daemon: timers plus the trigger gateway.
//!
//! Environment:
//! - `INTEGRATION_CONFIG`: JSON config path (default `config/integration.json`)
//! - `RUST_LOG`: tracing filter (default `info`)
//! - `LOG_FORMAT=json`: JSON log lines

use anyhow::Context;
use integration_engine::{gateway, IntegrationConfig, IntegrationEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config() -> anyhow::Result<IntegrationConfig> {
    let path = std::env::var("INTEGRATION_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/integration.json"));

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(IntegrationConfig::default());
    }
    let config = IntegrationConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), "Config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config()?;
    let bind = config.server.bind.clone();
    let (_config_tx, config_rx) = watch::channel(config);

    let engine = Arc::new(IntegrationEngine::new(config_rx));
    engine.start().await.context("starting engine")?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(bind = %bind, "Trigger gateway listening");

    let app = gateway::router(Arc::clone(&engine));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("serving gateway")?;

    engine.shutdown().await;
    Ok(())
}
