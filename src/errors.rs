/*!
 * Error types for the gapfill application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with completion provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when building or sending an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Network failures, timeouts, rate limiting and server-side (5xx, 408, 429)
    /// errors are transient. Everything else means the request itself is wrong
    /// and is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => {
                *status_code == 408 || *status_code == 429 || *status_code >= 500
            }
            Self::RequestFailed(_) | Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }

    /// Classify an HTTP error status returned by a provider
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Structural problems in the input dataset. Always fatal at load time.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The dataset file could not be read
    #[error("Failed to read dataset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dataset is not valid JSON
    #[error("Dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No array of records could be located in the document
    #[error("No records found in the dataset: {0}")]
    NoRecords(String),

    /// A record entry is not a JSON object
    #[error("Record #{index} is not an object")]
    NotAnObject { index: usize },

    /// A record has no `id` field
    #[error("Record #{index} has no id")]
    MissingId { index: usize },

    /// A record id is not a non-negative integer
    #[error("Record #{index} has a non-integer id: {value}")]
    InvalidId { index: usize, value: String },

    /// Two records share the same id
    #[error("Duplicate record id: {0}")]
    DuplicateId(u64),

    /// A record carries no translatable text
    #[error("Record {0} has no text to translate")]
    EmptyPayload(u64),
}

/// Errors raised by the persisted batch store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing a batch artifact failed
    #[error("Batch store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file operation on the store failed
    #[error("Batch store access failed at {path:?}: {message}")]
    Access { path: PathBuf, message: String },

    /// A batch artifact could not be (de)serialized
    #[error("Batch store JSON error at {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Resuming against a store written for different input
    #[error("Batch store {path:?} belongs to another run: {reason}")]
    ManifestMismatch { path: PathBuf, reason: String },

    /// A fresh run would mix with batches from an earlier run
    #[error("Batch directory {0:?} already holds batch files (use --resume or --force)")]
    ExistingBatches(PathBuf),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from dataset loading
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Error from the batch store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

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
