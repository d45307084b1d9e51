// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use response_rates::cli::Args;
use response_rates::config::load_config;
use response_rates::render::PlottersRenderer;
use response_rates::{AppState, SqlitePool, serve};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let log_level = config.log_level();
    simple_logger::init_with_level(log_level)?;
    info!("Log level set to: {:?}", log_level);

    let pool = SqlitePool::open(config.database.pool_settings())
        .context("Failed to open response rates database")?;
    info!(
        "Using database {} (pool_size={}, max_overflow={})",
        config.database.path.display(),
        config.database.pool_size,
        config.database.max_overflow
    );

    let charts = PlottersRenderer::new(
        config.chart.width,
        config.chart.height,
        config.chart.font.as_deref(),
    );
    let state = AppState::new(Arc::new(pool), Arc::new(charts));

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on {address}");

    serve(listener, state).await
}
