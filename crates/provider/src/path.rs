//! Identifier validation for providers that map ids onto filesystem paths.

use crate::error::{ErrorKind, Result};

/// Validates that a text or section identifier is usable as a single path
/// segment beneath a provider root.
///
/// > **Note:** This does **not** normalize anything. Identifiers are opaque;
/// >           they either pass through untouched or are rejected.
///
/// # Examples
///
/// ```
/// use lectern_provider::validate_segment;
/// assert!(validate_segment("eng_kjv").is_ok());
/// assert!(validate_segment("GN01").is_ok());
/// assert!(validate_segment("../etc").is_err());
/// assert!(validate_segment("a/b").is_err());
/// ```
pub fn validate_segment(id: &str) -> Result<&str> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        // Null bytes cause truncation in C-based syscalls; separators would
        // let an id walk out of its directory.
        || id.contains(['/', '\\', '\0']);
    match invalid {
        true => exn::bail!(ErrorKind::InvalidIdentifier(id.to_string())),
        false => Ok(id),
    }
}
