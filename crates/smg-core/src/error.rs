//! Error types for the sitemap generation pipeline.
//!
//! Every failure is assigned an [`ErrorClass`] so callers can tell
//! retryable connection problems apart from configuration mistakes and
//! local I/O failures when mapping a run outcome to an exit code.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration detected before any fetch (bad URL template,
    /// missing field). Fatal to the affected source only.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure, timeout, or non-2xx response. Retryable up to
    /// the configured budget.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Unparsable record content. The record is skipped, never fatal.
    #[error("Data error: {0}")]
    Data(String),

    /// Filesystem failure while writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while serializing sitemap XML
    #[error("XML error: {0}")]
    Xml(String),

    /// The run was interrupted by a shutdown signal
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse failure classes used for exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Connection,
    Data,
    Io,
    Cancelled,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create a data error
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an XML serialization error
    pub fn xml(msg: impl Into<String>) -> Self {
        Error::Xml(msg.into())
    }

    /// Whether retrying the same operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// The coarse class of this error. XML serialization failures count
    /// as I/O: they surface on the write path and are local, not remote.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Config(_) => ErrorClass::Config,
            Error::Connection(_) => ErrorClass::Connection,
            Error::Data(_) => ErrorClass::Data,
            Error::Io(_) | Error::Xml(_) => ErrorClass::Io,
            Error::Cancelled => ErrorClass::Cancelled,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::connection(format!("Request timed out: {}", err))
        } else if let Some(status) = err.status() {
            Error::connection(format!("HTTP status {} from store: {}", status, err))
        } else {
            Error::connection(format!("Network error: {}", err))
        }
    }
}
