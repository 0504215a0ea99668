//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::remote::DEFAULT_GITHUB_API;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file holding the local record store
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Base URL of the GitHub REST API
    pub github_api: String,
    /// Period of the background pull while remote sync is enabled
    pub sync_interval: Duration,
    /// Lifetime of an admin session
    pub session_ttl: chrono::Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("ROSTER_DB_PATH")
            .unwrap_or_else(|_| "./data/roster.sqlite".to_string())
            .into();

        let bind_addr = env::var("ROSTER_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid ROSTER_BIND_ADDR format");

        let log_level = env::var("ROSTER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let github_api = env::var("ROSTER_GITHUB_API")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_GITHUB_API.to_string());

        let sync_interval_secs = env::var("ROSTER_SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

        let session_ttl_hours = env::var("ROSTER_SESSION_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);

        Self {
            db_path,
            bind_addr,
            log_level,
            github_api,
            sync_interval: Duration::from_secs(sync_interval_secs),
            session_ttl: chrono::Duration::hours(session_ttl_hours),
        }
    }
}
