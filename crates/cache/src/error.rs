//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Provider errors are kept as children
//! in the error tree, untouched.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No provider is registered under the resolved name. Never retried.
    #[display("no provider registered as: {_0}")]
    ProviderNotFound(#[error(not(source))] String),
    /// The provider failed to deliver (network, parse, missing text).
    #[display("provider fetch failed")]
    FetchFailed,
    /// One provider's catalog could not be read during aggregation. Only
    /// ever logged; manifest callers never see it.
    #[display("manifest from provider {_0} is missing from the catalog")]
    ManifestPartial(#[error(not(source))] String),
    /// The provider's search failed or isn't supported.
    #[display("search failed")]
    Search,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchFailed)
    }
}
