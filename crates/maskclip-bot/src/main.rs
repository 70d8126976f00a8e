//! Telegram bot binary: receives videos, mixes in the mask, sends them back.

mod handlers;
mod telegram;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use metrics_exporter_prometheus::PrometheusBuilder;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use maskclip_media::FfmpegEngine;
use maskclip_storage::StagingArea;
use maskclip_worker::{spawn_expiry_sweeper, EventDispatcher, PipelineConfig, SessionManager};

use crate::telegram::TelegramTransport;

const DEFAULT_TOKEN_FILE: &str = "token.txt";

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!("Bot failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["maskclip=info", "teloxide=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting maskclip-bot");

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("Invalid METRICS_ADDR: {}", addr))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Serving Prometheus metrics");
    }

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let staging = StagingArea::new(&config.staging_dir);
    staging.ensure_root().await?;
    let orphans = staging.sweep_orphans().await?;
    if orphans > 0 {
        info!(orphans, "Cleared staging leftovers from a previous run");
    }

    if !tokio::fs::try_exists(&config.mask_path).await.unwrap_or(false) {
        warn!(
            mask = %config.mask_path.display(),
            "Mask asset not found; every transcode will fail until it is provided"
        );
    }

    let engine = FfmpegEngine::detect(config.stage_timeout.as_secs())
        .context("FFmpeg is required")?;

    let bot = Bot::new(load_token().await?);
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let manager = Arc::new(SessionManager::new(config, Arc::new(engine), transport));
    let dispatcher = Arc::new(EventDispatcher::new(manager.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = spawn_expiry_sweeper(manager, shutdown_rx);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback_query));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        warn!("Sweeper task ended abnormally: {}", e);
    }

    info!("maskclip-bot stopped");
    Ok(())
}

/// Bot token from `TELOXIDE_TOKEN`, else from the file named by `BOT_TOKEN_FILE`.
async fn load_token() -> anyhow::Result<String> {
    if let Ok(token) = std::env::var("TELOXIDE_TOKEN") {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }

    let path = std::env::var("BOT_TOKEN_FILE").unwrap_or_else(|_| DEFAULT_TOKEN_FILE.to_string());
    let token = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read bot token from {}", path))?;
    let token = token.trim();
    if token.is_empty() {
        bail!("Bot token file {} is empty", path);
    }
    Ok(token.to_string())
}
