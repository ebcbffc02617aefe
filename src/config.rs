//! Service configuration loaded from the environment.

use crate::types::Environment;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// How often each open session asks the feed whether the game is over
    pub poll_interval: Duration,
    /// Upper bound for a single feed call, also used as the HTTP client timeout
    pub fetch_timeout: Duration,
    pub environment: Environment,
    /// Where finalized results are persisted (None = memory only)
    pub ledger_path: Option<PathBuf>,
    pub leaderboard_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 6574,
            poll_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
            environment: Environment::Development,
            ledger_path: None,
            leaderboard_size: 10,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: std::env::var("PICKEM_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            poll_interval: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            fetch_timeout: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            environment: environment_from_env(),
            ledger_path: std::env::var("LEDGER_PATH")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            leaderboard_size: std::env::var("LEADERBOARD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.leaderboard_size),
        }
    }
}

/// Mock data means test; otherwise PICKEM_ENV decides, defaulting to development
fn environment_from_env() -> Environment {
    let use_mock = std::env::var("USE_MOCK_API")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);
    if use_mock {
        return Environment::Test;
    }

    match std::env::var("PICKEM_ENV").as_deref() {
        Ok("production") => Environment::Production,
        _ => Environment::Development,
    }
}
