//! # Configuration Module
//!
//! Runtime configuration read from the environment (after `.env` has been
//! loaded by `main`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

// Constants for bot configuration
pub const DEFAULT_REGISTRATION_TIMEOUT_HOURS: u64 = 6;
pub const DEFAULT_SEARCH_PAGE_SIZE: usize = 10;
pub const DEFAULT_LOCALES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/locales");

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuration structure for the bot process
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Postgres connection string
    pub database_url: String,
    /// Community chat the invite links are created for
    pub channel_id: Option<i64>,
    /// Inactivity interval after which a registration is abandoned
    pub registration_timeout: Duration,
    /// Number of users per search page
    pub search_page_size: usize,
    /// Directory holding `<lang>/main.ftl`
    pub locales_dir: PathBuf,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let channel_id = match lookup("CHANNEL_ID") {
            Some(value) if !value.trim().is_empty() => Some(parse_var("CHANNEL_ID", &value)?),
            _ => None,
        };

        let timeout_hours = match lookup("REGISTRATION_TIMEOUT_HOURS") {
            Some(value) => parse_var::<u64>("REGISTRATION_TIMEOUT_HOURS", &value)?,
            None => DEFAULT_REGISTRATION_TIMEOUT_HOURS,
        };

        let search_page_size = match lookup("SEARCH_PAGE_SIZE") {
            Some(value) => parse_var::<usize>("SEARCH_PAGE_SIZE", &value)?,
            None => DEFAULT_SEARCH_PAGE_SIZE,
        };
        if search_page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "SEARCH_PAGE_SIZE",
                value: "0".to_string(),
            });
        }

        let locales_dir = lookup("LOCALES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCALES_DIR));

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bot_token,
            database_url,
            channel_id,
            registration_timeout: Duration::from_secs(timeout_hours * 3600),
            search_page_size,
            locales_dir,
            log_format,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
