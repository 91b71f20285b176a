//! Bucket Cache - warm cache process
//!
//! Builds a cache from the environment, restores the last snapshot, keeps
//! the expiry janitor running and writes a fresh snapshot on shutdown.

use anyhow::Context;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bucket_cache::{BucketCache, Config};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the sharded cache and start the expiry janitor
/// 4. Restore the snapshot, if one is configured
/// 5. Wait for SIGINT/SIGTERM, then save the snapshot and stop the janitor
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bucket_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Bucket Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: shards={}, default_ttl={}s, cleanup_interval={}s, snapshot={:?}",
        config.shard_count, config.default_ttl, config.cleanup_interval, config.snapshot_path
    );

    let cache = BucketCache::from_config(&config).context("failed to build cache")?;
    cache.on_evicted(|key, value| {
        debug!("Evicted {} ({})", key, value.kind());
    });

    if let Some(path) = &config.snapshot_path {
        let restored = cache
            .load_shard_files(path)
            .with_context(|| format!("failed to restore snapshot {}", path.display()))?;
        info!("Restored {} items", restored);
    }

    shutdown_signal().await;

    if let Some(path) = &config.snapshot_path {
        cache
            .save_to_file(path)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
    }

    cache.shutdown().await;
    info!("Shutdown complete: {} items held at exit", cache.len());
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
