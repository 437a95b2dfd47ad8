use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Used when a company has no timezone configured.
    pub default_timezone: Tz,
    pub settings_cache_ttl: Duration,
    pub log_dir: String,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("{key} has an invalid value: {raw}"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            server_addr: required(&lookup, "SERVER_ADDR")?,
            database_url: required(&lookup, "DATABASE_URL")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,

            rate_protected_per_min: parsed(&lookup, "RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            default_timezone: parsed(&lookup, "DEFAULT_TIMEZONE", "UTC")?,
            settings_cache_ttl: Duration::from_secs(parsed(
                &lookup,
                "SETTINGS_CACHE_TTL_SECS",
                "300",
            )?),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}
