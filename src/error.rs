//! Application Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Fix the configuration and start again.
    #[display("invalid configuration")]
    Config,
    /// A configured provider could not be set up.
    #[display("provider `{_0}` could not be registered")]
    Provider(#[error(not(source))] String),
    /// The text's metadata could not be fetched.
    #[display("text `{_0}` unavailable")]
    Text(#[error(not(source))] String),
    /// The window could not show the requested section.
    #[display("could not open section `{_0}`")]
    Open(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Text(_) | Self::Open(_))
    }
}
