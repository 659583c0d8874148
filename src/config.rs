//! Engine configuration from environment variables

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Default deadline for every store call
    pub store_timeout: Duration,

    /// Entries fetched per ordered scan when ranking a whole leaderboard
    pub rank_page_size: usize,

    /// Idle connections kept by the SQLite store
    pub pool_max_idle: usize,

    /// Default for `normalize_addresses` on queries and pushes
    pub normalize_addresses: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "data/leaderboard.db".to_string(),
            store_timeout: Duration::from_millis(5_000),
            rank_page_size: 1_000,
            pool_max_idle: 4,
            normalize_addresses: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `LEADERBOARD_DB_PATH` (default: data/leaderboard.db)
    /// - `STORE_TIMEOUT_MS` (default: 5000)
    /// - `RANK_PAGE_SIZE` (default: 1000, zero is ignored)
    /// - `POOL_MAX_IDLE` (default: 4)
    /// - `NORMALIZE_ADDRESSES` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            db_path: env::var("LEADERBOARD_DB_PATH").unwrap_or(defaults.db_path),

            store_timeout: env::var("STORE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),

            rank_page_size: env::var("RANK_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|size: &usize| *size > 0)
                .unwrap_or(defaults.rank_page_size),

            pool_max_idle: env::var("POOL_MAX_IDLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_max_idle),

            normalize_addresses: env::var("NORMALIZE_ADDRESSES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.normalize_addresses),
        }
    }
}
