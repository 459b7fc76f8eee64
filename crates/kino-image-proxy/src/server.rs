//! HTTP server for image proxy endpoints
//!
//! Provides /health and /images/tmdb/{size}/{*file_path}.

use crate::error::Result;
use crate::types::HealthResponse;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tmdb_image_cache::ImageCache;
use tower_http::cors::CorsLayer;
use tracing::info;

const CACHE_CONTROL: &str = "public, max-age=86400";

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: ImageCache,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: ImageCache) -> Self {
        Self {
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/images/tmdb/{size}/{*file_path}", get(tmdb_image))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_stats = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: cache_stats,
    })
}

/// Serve a TMDB image through the disk cache, e.g. /images/tmdb/w780/abcd123.jpg
async fn tmdb_image(
    State(state): State<SharedState>,
    Path((size, file_path)): Path<(String, String)>,
) -> Result<Response> {
    let image = state.cache.fetch_cached_image(&size, &file_path).await?;
    let cache_header = if image.from_cache { "HIT" } else { "MISS" };
    let content_type = image.content_type;
    let data = image.into_bytes().await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .header("X-Cache", cache_header)
        .body(Body::from(data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}
