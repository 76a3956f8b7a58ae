//! Server configuration loaded from environment variables.
//!
//! - `SPY_CAT_DATABASE_PATH` - SQLite file (default: platform data directory)
//! - `SPY_CAT_CORS_ORIGINS` - Allowed frontend origins, comma-separated
//!   (default: `http://localhost:3000`)
//! - `SPY_CAT_BREEDS_URL` - Breed catalogue base URL (default: TheCatAPI)
//! - `SPY_CAT_BREEDS_API_KEY` - Breed catalogue API key (optional)
//! - `SPY_CAT_BREEDS_TIMEOUT_SECS` - Breed lookup timeout in seconds (default: 5)

use std::path::PathBuf;
use std::time::Duration;

use crate::breeds::{CatApiClassifier, DEFAULT_BREEDS_URL, DEFAULT_TIMEOUT};

/// Origin of the Next.js frontend dev server.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct Config {
    /// Database file. `None` means the platform default location.
    pub database_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub breeds_url: String,
    pub breeds_api_key: Option<String>,
    pub breeds_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_path = lookup("SPY_CAT_DATABASE_PATH").map(PathBuf::from);

        let cors_origins = lookup("SPY_CAT_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.to_string()]);

        let breeds_url =
            lookup("SPY_CAT_BREEDS_URL").unwrap_or_else(|| DEFAULT_BREEDS_URL.to_string());

        let breeds_timeout = lookup("SPY_CAT_BREEDS_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Self {
            database_path,
            cors_origins,
            breeds_url,
            breeds_api_key: lookup("SPY_CAT_BREEDS_API_KEY"),
            breeds_timeout,
        }
    }

    /// Build the network breed classifier described by this config.
    pub fn breed_classifier(&self) -> anyhow::Result<CatApiClassifier> {
        CatApiClassifier::new(
            self.breeds_url.clone(),
            self.breeds_api_key.clone(),
            self.breeds_timeout,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
