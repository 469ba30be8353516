//! Error types for porksync
//!
//! This module defines all error types used throughout the crate.
//!
//! The variants follow the run's failure taxonomy. Whether a failure aborts
//! the whole run or only the affected domain/entry is decided by the
//! [`Reconciler`](crate::engine::Reconciler), not here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for porksync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for porksync
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing catalogue, credentials or settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Registrar request failed or returned something unexpected
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Hostname could not be resolved to an IPv4 address
    #[error("Resolution error for {host}: {message}")]
    Resolution {
        /// The hostname that was looked up
        host: String,
        /// Error message
        message: String,
    },

    /// Malformed IPv4 literal in registrar data
    #[error("Malformed IPv4 address: {0:?}")]
    Parse(String),

    /// Certificate material could not be written
    #[error("Filesystem error at {}: {message}", path.display())]
    Filesystem {
        /// Path that failed
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a parse error for a malformed address literal
    pub fn parse(literal: impl Into<String>) -> Self {
        Self::Parse(literal.into())
    }

    /// Create a filesystem error
    pub fn filesystem(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from malformed address data
    ///
    /// The binary exits with a distinct status for these.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
