//! Segment-semantics glob matching for path search.
//!
//! `*` matches exactly one path segment, `**` matches zero or more segments.
//! Built on `globset` with `/` as a literal separator.

use globset::{GlobBuilder, GlobMatcher};
use rpg_core::error::{Result, RpgError};

/// Compile a pattern into a matcher honoring segment semantics.
pub fn path_matcher(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| RpgError::Validation(format!("invalid path glob '{pattern}': {e}")))?;
    Ok(glob.compile_matcher())
}
