//! Kino Image Proxy - TMDB poster proxy with a disk cache
//!
//! Serves /images/tmdb/{size}/{path} from a local cache directory, fetching
//! from the TMDB image CDN on a miss and keeping the directory within its
//! configured size and age limits.

mod config;
mod error;
mod server;
mod types;

use crate::config::Config;
use crate::error::{ProxyError, Result};
use crate::server::{start_server, ServerState, SharedState};
use std::sync::Arc;
use tmdb_image_cache::ImageCache;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("kino_image_proxy=info".parse()?)
        .add_directive("tmdb_image_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if config.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Kino Image Proxy...");
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache.cache_dir);
    info!(
        "Max cache size: {} MB",
        config.cache.max_cache_bytes / (1024 * 1024)
    );
    info!(
        "Max file size: {} MB",
        config.cache.max_file_bytes / (1024 * 1024)
    );
    info!("Max age: {} days", config.cache.max_age_days);
    info!("Origin: {}", config.cache.origin_base_url);

    let cache = ImageCache::new(config.cache)
        .map_err(|e| ProxyError::Config(format!("Invalid cache settings: {}", e)))?;
    cache.init().await?;

    // Create shared state
    let state: SharedState = Arc::new(ServerState::new(cache));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ProxyError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
