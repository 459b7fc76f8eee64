//! Service configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tmdb_image_cache::CacheConfig;

const DEFAULT_PORT: u16 = 8000;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cache: CacheConfig,
    /// Emit Stackdriver JSON logs instead of plain text
    pub log_json: bool,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from any variable source. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CacheConfig::default();

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT);

        let cache_dir = lookup("TMDB_IMAGE_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let max_cache_bytes = parse_or(
            &lookup,
            "TMDB_IMAGE_CACHE_MAX_BYTES",
            defaults.max_cache_bytes,
        );
        let max_file_bytes = parse_or(
            &lookup,
            "TMDB_IMAGE_CACHE_MAX_FILE_BYTES",
            defaults.max_file_bytes,
        );
        let max_age_days = parse_or(
            &lookup,
            "TMDB_IMAGE_CACHE_MAX_AGE_DAYS",
            defaults.max_age_days,
        );

        let origin_base_url = lookup("TMDB_IMAGE_BASE_URL").unwrap_or(defaults.origin_base_url);

        let log_json = lookup("LOG_FORMAT").is_some_and(|v| v == "json");

        Self {
            port,
            cache: CacheConfig {
                cache_dir,
                max_cache_bytes,
                max_file_bytes,
                max_age_days,
                origin_base_url,
            },
            log_json,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
