use std::path::PathBuf;

use crate::{Error, Result};

pub const DEFAULT_INDEX_PRICE_URL: &str =
    "https://api.0dtespx.com/aggregateData?series=spx,spxExpectedMove&date=live&interval=30";
pub const DEFAULT_QUOTE_API_URL: &str = "https://www.alphavantage.co/query";

/// All configuration loaded from environment variables at startup.
///
/// Every variable has a default except the credentials, which are checked
/// by the command that needs them (`require_*`).
#[derive(Debug, Clone)]
pub struct Config {
    // Notifications
    pub discord_webhook_url: Option<String>,

    // Market data
    pub index_price_url: String,
    pub index_symbol: String,
    pub quote_api_url: String,
    pub quote_api_key: Option<String>,
    pub quote_symbol: String,

    // Files
    pub levels_dir: PathBuf,
    pub data_dir: PathBuf,
    pub rules_path: String,
    pub git_autocommit: bool,

    // Health server
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Used by `from_env` and by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{raw}'")))?,
            None => 10_000,
        };

        let git_autocommit = match get("GIT_AUTOCOMMIT") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| Error::Config(format!("GIT_AUTOCOMMIT must be true/false, got '{raw}'")))?,
            None => false,
        };

        Ok(Config {
            discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            index_price_url: get("INDEX_PRICE_URL")
                .unwrap_or_else(|| DEFAULT_INDEX_PRICE_URL.to_string()),
            index_symbol: get("INDEX_SYMBOL").unwrap_or_else(|| "SPX".to_string()),
            quote_api_url: get("QUOTE_API_URL").unwrap_or_else(|| DEFAULT_QUOTE_API_URL.to_string()),
            quote_api_key: get("ALPHA_VANTAGE_KEY"),
            quote_symbol: get("QUOTE_SYMBOL").unwrap_or_else(|| "SPY".to_string()),
            levels_dir: get("LEVELS_DIR").unwrap_or_else(|| "levels".to_string()).into(),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()).into(),
            rules_path: get("MONITOR_CONFIG_PATH")
                .unwrap_or_else(|| "config/monitor.toml".to_string()),
            git_autocommit,
            port,
        })
    }

    pub fn require_webhook(&self) -> Result<&str> {
        self.discord_webhook_url.as_deref().ok_or_else(|| {
            Error::Config("DISCORD_WEBHOOK_URL is not set. Check your .env file.".to_string())
        })
    }

    pub fn require_quote_key(&self) -> Result<&str> {
        self.quote_api_key.as_deref().ok_or_else(|| {
            Error::Config("ALPHA_VANTAGE_KEY is not set. Check your .env file.".to_string())
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
