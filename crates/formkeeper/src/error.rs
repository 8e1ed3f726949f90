//! Error types for formkeeper.
//!
//! This module defines all error types used throughout the formkeeper crate.
//! Errors raised while applying a relayed submission are logged and swallowed
//! at the relay loop; errors raised during startup propagate to `main`.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for formkeeper operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Network Errors ===
    /// Failed to bind a listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Submission Errors ===
    /// A form segment did not contain exactly one `=` separator.
    #[error("malformed form segment {segment:?}: expected exactly one '='")]
    MalformedField {
        /// The offending segment, as received.
        segment: String,
    },

    /// A relayed datagram was not valid UTF-8.
    #[error("datagram is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    // === Store Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to rewrite the store file.
    #[error("failed to write store file {path}: {source}")]
    StoreWrite {
        /// Path to the store file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for formkeeper operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a bind error for the given address.
    #[must_use]
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    /// Create a malformed-field error for the given segment.
    #[must_use]
    pub fn malformed_field(segment: impl Into<String>) -> Self {
        Self::MalformedField {
            segment: segment.into(),
        }
    }

    /// Check if this error was caused by a bad submission rather than by
    /// the process's own environment.
    #[must_use]
    pub fn is_submission_error(&self) -> bool {
        matches!(self, Self::MalformedField { .. } | Self::InvalidUtf8(_))
    }
}
