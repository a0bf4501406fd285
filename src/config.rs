use crate::error::{AppError, Result};
use crate::types::AlertPolicy;

pub const API_URL: &str = "https://v2.airline-club.com/oil-prices";

/// Feed requests give up after this many seconds; the tick is skipped.
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Webhook posts give up after this many seconds.
pub const NOTIFY_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_THRESHOLD: f64 = 55.0;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 10;

/// Subject key of the single monitored record.
pub const DEFAULT_SUBJECT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    Sqlite,
    File,
    Memory,
}

impl std::str::FromStr for StateBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StateBackend::Sqlite),
            "file" | "json" => Ok(StateBackend::File),
            "memory" => Ok(StateBackend::Memory),
            other => Err(format!("unknown state backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// Seeded into a fresh state record (OIL_PRICE_THRESHOLD)
    pub default_threshold: f64,
    /// Seeded into a fresh state record (CHECK_INTERVAL_MINUTES)
    pub default_interval_minutes: u32,
    pub policy: AlertPolicy,
    pub backend: StateBackend,
    pub db_path: String,
    pub state_file_path: String,
    pub subject: String,
    /// Discord-compatible webhook. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    /// Mentioned on alerts (DISCORD_USER_ID)
    pub user_id: Option<String>,
    /// Post a status line on every new cycle (CYCLE_UPDATES)
    pub cycle_updates: bool,
    pub api_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_threshold = std::env::var("OIL_PRICE_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_THRESHOLD.to_string())
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite() && *t > 0.0)
            .ok_or_else(|| {
                AppError::Config("OIL_PRICE_THRESHOLD must be a positive number".to_string())
            })?;

        let default_interval_minutes = std::env::var("CHECK_INTERVAL_MINUTES")
            .unwrap_or_else(|_| DEFAULT_INTERVAL_MINUTES.to_string())
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| *m >= 1)
            .ok_or_else(|| {
                AppError::Config("CHECK_INTERVAL_MINUTES must be at least 1".to_string())
            })?;

        let policy = std::env::var("ALERT_POLICY")
            .unwrap_or_else(|_| "ping-once".to_string())
            .parse::<AlertPolicy>()
            .map_err(AppError::Config)?;

        let backend = std::env::var("STATE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse::<StateBackend>()
            .map_err(AppError::Config)?;

        Ok(Self {
            api_url: std::env::var("API_URL").unwrap_or_else(|_| API_URL.to_string()),
            default_threshold,
            default_interval_minutes,
            policy,
            backend,
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "bot_data.db".to_string()),
            state_file_path: std::env::var("STATE_FILE_PATH")
                .unwrap_or_else(|_| "oil_price_bot_state.json".to_string()),
            subject: std::env::var("SUBJECT").unwrap_or_else(|_| DEFAULT_SUBJECT.to_string()),
            webhook_url: non_empty_var("DISCORD_WEBHOOK_URL"),
            user_id: non_empty_var("DISCORD_USER_ID"),
            cycle_updates: std::env::var("CYCLE_UPDATES")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
