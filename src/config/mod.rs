//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. The store URL
//! may embed a password, so it is wrapped in `secrecy::SecretString`.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Debug)]
pub struct Config {
    pub redis_url: SecretString,
    /// Idle dedicated connections kept for blocking dequeues.
    pub redis_pool_size: usize,
    /// Longest single wait of a dequeue attempt before cancellation is rechecked.
    pub poll_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let poll_timeout_ms: u64 = parse_var("Q_POLL_TIMEOUT_MS", 1000)?;
        if poll_timeout_ms == 0 {
            return Err(Error::Config(
                "Q_POLL_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            redis_url: SecretString::from(
                std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            ),
            redis_pool_size: parse_var("REDIS_POOL_SIZE", 8)?,
            poll_timeout: Duration::from_millis(poll_timeout_ms),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            poll_timeout: self.poll_timeout,
            ..EngineConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} is not a valid number: {raw:?}"))),
        _ => Ok(default),
    }
}
