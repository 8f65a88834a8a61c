//! Error types for the rate refresh pipeline.
//!
//! Only [`RemoteError`] ever leaves the component that raised it, and even
//! then it is reduced to a boolean success flag plus a log line by the
//! coordinator. The other kinds are absorbed where they occur.

use thiserror::Error;

/// Unified startup error for the binary.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Rates service error: {0}")]
    Remote(#[from] RemoteError),
}

/// Failure of the primary rate-snapshot fetch.
///
/// `Clone` so that every caller joined on a single in-flight refresh can
/// receive its own copy of the outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rates service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed rates document: {message}")]
    Parse { message: String },

    #[error("Rates document is missing the 'rates' key")]
    MissingRates,

    #[error("Refresh task ended without producing an outcome")]
    Abandoned,
}

/// Failure of the `/providers` discovery endpoint. Always replaced by the
/// static provider table before reaching a caller of `fetch_providers`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderDiscoveryError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Providers endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed providers document: {message}")]
    Parse { message: String },

    #[error("Providers endpoint listed no usable providers")]
    Empty,
}

/// Failure of the best-effort remote refresh ping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Refresh endpoint returned HTTP {status}")]
    Status { status: u16 },
}

/// Value-level parse failure inside the derived metric set.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid timestamp '{value}'")]
    Timestamp { value: String },

    #[error("Invalid amount '{value}'")]
    Amount { value: String },
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }
}

impl NotifyError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }
}
