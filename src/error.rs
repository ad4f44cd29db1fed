//! Error types for userdata-packager
//!
//! One crate-wide error enum covers the request lifecycle: validation of
//! incoming requests, remote table-service failures, object-storage
//! failures, poll-loop exhaustion, and local I/O. Task-level failures are
//! collected into error logs by the packager rather than aborting the
//! request; request-level failures propagate to the caller.

use thiserror::Error;

/// Result type alias for userdata-packager operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for userdata-packager
#[derive(Debug, Error)]
pub enum Error {
    /// Request failed validation (missing field, empty field, inverted date range)
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.userdata_bucket")
        key: Option<String>,
    },

    /// Remote table service reported a failure
    #[error("table service error: {0}")]
    Service(String),

    /// An asynchronous remote job did not become ready within the configured retry budget
    #[error("async job timed out after {tries} tries")]
    Timeout {
        /// Number of poll attempts made before giving up
        tries: u32,
    },

    /// Object storage operation failed
    #[error("object storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive creation or read error
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation (worker panic, duplicate archive entry)
    #[error("internal error: {0}")]
    Internal(String),
}
