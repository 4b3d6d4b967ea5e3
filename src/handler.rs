//! Message handlers and the errors they report.
//!
//! A handler receives the dequeued payload and the worker's cancellation
//! token. Returning `Err` routes the message to the failure list; the
//! worker loop carries on either way.

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Failure reported by a handler.
///
/// The detail level is fixed when the error is built: an error created
/// with a trace is recorded with the trace, otherwise with its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
    trace: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    /// An error carrying a detailed trace (cause chain, backtrace, ...).
    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Some(trace.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// The most detailed text available: the trace if present, else the message.
    pub fn detail(&self) -> &str {
        self.trace.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        // `{:?}` on anyhow prints the cause chain and, when captured, the backtrace.
        Self::with_trace(err.to_string(), format!("{err:?}"))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Something that processes one payload at a time.
///
/// Implemented for any `Fn(CancellationToken, String) -> Future` closure,
/// so most callers never implement it by hand.
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        cancel: CancellationToken,
        payload: String,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(CancellationToken, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    fn handle(
        &self,
        cancel: CancellationToken,
        payload: String,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        self(cancel, payload)
    }
}
