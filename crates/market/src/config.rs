//! Marketplace configuration loaded from the environment.

use std::str::FromStr;

use crate::error::MarketError;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(MarketError::Config(format!(
                "LOG_FORMAT must be 'compact' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Marketplace configuration loaded from environment variables.
///
/// All fields have defaults suitable for local use; override via env.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Change feed buffer of the in-memory store (default: `1024`).
    pub change_feed_capacity: usize,
    /// Total attempts for a listing request: first try plus at most one
    /// retry (default: `2`, allowed `1..=2`).
    pub request_max_attempts: u32,
    /// Log output format (default: `compact`).
    pub log_format: LogFormat,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            change_feed_capacity: 1024,
            request_max_attempts: 2,
            log_format: LogFormat::Compact,
        }
    }
}

impl MarketConfig {
    /// Load configuration from the process environment (and `.env`).
    ///
    /// | Env Var                 | Default   |
    /// |-------------------------|-----------|
    /// | `CHANGE_FEED_CAPACITY`  | `1024`    |
    /// | `REQUEST_MAX_ATTEMPTS`  | `2`       |
    /// | `LOG_FORMAT`            | `compact` |
    pub fn from_env() -> Result<Self, MarketError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MarketError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let change_feed_capacity = match lookup("CHANGE_FEED_CAPACITY") {
            Some(raw) => raw.trim().parse::<usize>().ok().filter(|c| *c > 0).ok_or_else(|| {
                MarketError::Config(format!(
                    "CHANGE_FEED_CAPACITY must be a positive integer, got '{raw}'"
                ))
            })?,
            None => defaults.change_feed_capacity,
        };

        let request_max_attempts = match lookup("REQUEST_MAX_ATTEMPTS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|a| (1..=2).contains(a))
                .ok_or_else(|| {
                    MarketError::Config(format!(
                        "REQUEST_MAX_ATTEMPTS must be 1 or 2, got '{raw}'"
                    ))
                })?,
            None => defaults.request_max_attempts,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            change_feed_capacity,
            request_max_attempts,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = MarketConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.change_feed_capacity, 1024);
        assert_eq!(config.request_max_attempts, 2);
        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = MarketConfig::from_lookup(lookup(&[
            ("CHANGE_FEED_CAPACITY", "64"),
            ("REQUEST_MAX_ATTEMPTS", "1"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.change_feed_capacity, 64);
        assert_eq!(config.request_max_attempts, 1);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(MarketConfig::from_lookup(lookup(&[("CHANGE_FEED_CAPACITY", "0")])).is_err());
        assert!(MarketConfig::from_lookup(lookup(&[("REQUEST_MAX_ATTEMPTS", "3")])).is_err());
        assert!(MarketConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
