//! Error types for q-rs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An operation that must touch exactly `expected` elements touched `got`.
    #[error("consistency violation: expected {expected} {what}, got {got}")]
    Consistency {
        what: &'static str,
        expected: i64,
        got: i64,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the store could not be reached or timed out.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Store(e) => {
                e.is_io_error() || e.is_connection_dropped() || e.is_timeout()
            }
            Error::Unavailable(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
