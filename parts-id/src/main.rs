//! parts-id - Auto parts identification service
//!
//! Accepts part photos over HTTP, identifies them with a hosted vision model
//! and falls back to a heavier identifier when the result is weak.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parts_common::config::{load_toml_config, resolve_config_path, TomlConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parts_id::config::{CliOverrides, ServiceConfig};
use parts_id::fallback::{build_fallback, FallbackLimits, FallbackRunner};
use parts_id::flags::FeatureFlags;
use parts_id::identifiers::build_primary;
use parts_id::orchestrator::IdentificationOrchestrator;
use parts_id::AppState;

const CONFIG_FILE_NAME: &str = "parts-id.toml";

/// Command-line arguments for parts-id
#[derive(Parser, Debug)]
#[command(name = "parts-id")]
#[command(about = "Auto parts identification service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "PARTS_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PARTS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PARTS_PORT")]
    port: Option<u16>,

    /// Primary vision provider (gemini, openai)
    #[arg(long, env = "PRIMARY_PROVIDER")]
    provider: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file first so its log level can seed the filter
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_FILE_NAME);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path).context("Failed to load config file")?,
        None => TomlConfig::default(),
    };

    let level = toml_config.logging.level.clone().unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("parts_id={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting parts-id v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using environment and defaults"),
    }

    let cli = CliOverrides {
        host: args.host,
        port: args.port,
        provider: args.provider,
    };
    let config = ServiceConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;
    config.log_summary();

    let flags = FeatureFlags::from_env();
    for (name, enabled) in flags.snapshot().await.iter() {
        info!(flag = name, enabled, "Feature flag");
    }

    let primary = build_primary(&config.providers).context("Failed to build primary identifier")?;
    info!("Primary identifier: {}", primary.name());

    let backend = build_fallback(&config.fallback, &config.providers)
        .context("Failed to build fallback identifier")?;

    // Cancelled on shutdown; aborts every in-flight fallback run
    let shutdown = CancellationToken::new();
    let runner = FallbackRunner::new(
        backend,
        FallbackLimits::from(&config.fallback),
        shutdown.clone(),
    );

    let orchestrator = IdentificationOrchestrator::new(
        primary,
        Arc::new(runner),
        flags.clone(),
        config.scoring.clone(),
    );

    let state = AppState::new(Arc::new(orchestrator), flags, config.upload.clone());
    let app = parts_id::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
