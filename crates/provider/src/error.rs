//! Provider Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A provider error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The provider does not know about the requested text.
    #[display("text not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error")]
    Io,
    /// Network-related error (remote catalogs, flaky transports, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Stored data could not be decoded.
    #[display("invalid provider data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Identifier would escape the provider root, or is otherwise unusable.
    #[display("invalid identifier: {_0}")]
    InvalidIdentifier(#[error(not(source))] String),
    /// Provider was constructed with an unusable configuration.
    #[display("invalid provider configuration: {_0}")]
    InvalidConfig(#[error(not(source))] String),
    /// The provider has no search capability.
    #[display("search not supported by provider: {_0}")]
    SearchUnsupported(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Network(_))
    }
}
