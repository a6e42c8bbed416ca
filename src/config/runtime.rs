// src/config/runtime.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "UPDATER_CONFIG";
pub const ENV_DB_PATH: &str = "UPDATER_DB";
pub const ENV_INTERVAL_SECS: &str = "CHECK_INTERVAL_SECS";
pub const ENV_FORCE_SEND: &str = "FORCE_SEND";
pub const ENV_DRY_RUN: &str = "NOTIFY_DRY_RUN";

const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_DB_PATH: &str = "covid19.db";
const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Process-level settings read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub interval: Duration,
    /// Run the first cycle even if the source looks stale.
    pub force_first: bool,
    /// Log texts instead of sending them.
    pub dry_run: bool,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        let interval_secs: u64 = env::var(ENV_INTERVAL_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_INTERVAL_SECS);

        Self {
            config_path: env::var(ENV_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
            db_path: env::var(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
            interval: Duration::from_secs(interval_secs),
            force_first: flag(ENV_FORCE_SEND),
            dry_run: flag(ENV_DRY_RUN),
        }
    }
}

fn flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
