//! Unified error type for the framegrid crates.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for a transport boundary to derive an HTTP status code via
//! [`Error::http_status`]. Note that per-segment processing failures and
//! callback delivery failures are recorded as job data, not surfaced here.

use std::fmt;

/// Unified error type covering all failure modes in framegrid.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A pipeline or application configuration is structurally invalid
    /// (empty pipeline, duplicate action names, unusable settings).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A supplied or environment-derived configuration value is malformed
    /// (unknown media-type token, bad property value).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A job submission failed validation. Every failing field is listed.
    #[error("Invalid request: {}", .problems.join("; "))]
    InvalidRequest {
        /// One entry per failing field.
        problems: Vec<String>,
    },

    /// An operation referenced a job that does not exist.
    #[error("Could not find job with id {id}")]
    UnknownJob {
        /// The identifier that was looked up.
        id: i64,
    },

    /// The operation conflicts with the job's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Configuration(_) => 500,
            Error::InvalidConfiguration(_) => 400,
            Error::InvalidRequest { .. } => 400,
            Error::UnknownJob { .. } => 404,
            Error::Conflict(_) => 409,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Convenience constructor for [`Error::InvalidConfiguration`].
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration(message.into())
    }

    /// Convenience constructor for [`Error::InvalidRequest`].
    pub fn invalid_request(problems: Vec<String>) -> Self {
        Error::InvalidRequest { problems }
    }

    /// Convenience constructor for [`Error::UnknownJob`].
    pub fn unknown_job(id: impl Into<i64>) -> Self {
        Error::UnknownJob { id: id.into() }
    }

    /// Convenience constructor for [`Error::Conflict`].
    pub fn conflict(message: impl fmt::Display) -> Self {
        Error::Conflict(message.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
