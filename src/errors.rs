/*!
 * Error types for the manifest-sync application.
 *
 * This module contains custom error types for the different stages of the
 * reconciliation pipeline, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when fetching a manifest document.
///
/// Every variant is a *fetch* failure: it feeds the retry bookkeeping and is
/// never reported as a validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection refused, TLS, bad URL)
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout
    #[error("Manifest fetch timed out after {0} seconds")]
    Timeout(u64),

    /// The server answered with a non-2xx status
    #[error("Manifest server responded with HTTP {status_code}")]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
    },

    /// The body was empty, too large, or not a JSON document
    #[error("Malformed manifest response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Classification code used in logs and notification messages
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::HttpStatus { .. } => "http-status",
            FetchError::MalformedResponse(_) => "malformed-response",
        }
    }
}

/// Errors that abort a reconciliation cycle for a single app
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Database failure; these are bugs, not transient conditions
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The app referenced by a cycle does not exist
    #[error("App {0} not found")]
    NotFound(i64),

    /// An external collaborator (notifier, storefront) failed
    #[error("Integration error: {0}")]
    Integration(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        Self::Persistence(format!("{:#}", error))
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Persistence(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the manifest fetcher
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
