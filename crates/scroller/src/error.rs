//! Scroller Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A scroller error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scroller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// `load` was called before any text was set.
    #[display("no text set")]
    NoText,
    /// The scroller has been closed; it accepts nothing further.
    #[display("scroller closed")]
    Closed,
    /// The content cache could not deliver the section.
    #[display("section load failed")]
    Load,
    /// The requested fragment isn't part of any mounted section.
    #[display("fragment not mounted: {_0}")]
    NotMounted(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load)
    }
}
