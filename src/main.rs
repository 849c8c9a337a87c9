//! Placeholder Image Server
//!
//! A Rust-based server that:
//! - Renders JPEG placeholders of any size from a fixed catalog of photos
//! - Applies saturation, blur, contrast and tint effects on a 1-9 scale
//! - Caches deterministic renders in memory with a TTL and size bound
//! - Shuts down gracefully on SIGTERM/SIGINT

mod config;
mod image_proc;
mod web;

use anyhow::Context;
use clap::Parser;
use config::Config;
use image_proc::{Catalog, ImageCache, ImageProcessor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "bugipsum")]
#[command(about = "Placeholder image server")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/bugipsum/config.json")]
    config: String,

    /// Web server port (overrides config, default: 8080)
    #[arg(long = "http-port")]
    http_port: Option<u16>,

    /// Directory containing the catalog images (overrides config)
    #[arg(long = "images-dir")]
    images_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose);

    tracing::info!("Starting placeholder image server");

    // Load configuration
    let mut config = Config::load(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {}: {}", args.config, e);
        tracing::info!("Using default configuration");
        Config::default()
    });

    if let Some(images_dir) = args.images_dir {
        config.images_dir = images_dir;
    }

    let catalog = Catalog::new(config.catalog_paths()).context("image catalog is empty")?;
    let missing = catalog.check_files();
    tracing::info!(
        "Catalog has {} images in {} ({} missing)",
        catalog.len(),
        config.images_dir.display(),
        missing
    );

    let cache = ImageCache::new(config.cache_ttl(), config.cache_max_entries);
    let processor = Arc::new(ImageProcessor::new(
        catalog,
        cache,
        config.max_concurrent_transforms,
        config.jpeg_quality,
    ));

    // Setup shutdown signal handling
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Create web server
    let port = args.http_port.unwrap_or(config.port);
    let web_server = web::WebServer::new(&config, processor);

    // Spawn web server task
    let web_shutdown = shutdown_tx.subscribe();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.run_with_shutdown(port, web_shutdown).await {
            tracing::error!("Web server error: {}", e);
        }
    });

    // Wait for shutdown signal
    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received");

    // Send shutdown to all tasks
    let _ = shutdown_tx.send(());

    tokio::select! {
        _ = web_handle => {},
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            tracing::warn!("Web server shutdown timeout");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
///
/// Default level is "info"; `--verbose` switches to "debug" for cache
/// HIT/MISS and per-step pipeline logs.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bugipsum={}", level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}
