//! Error taxonomy shared by every crate in the workspace.
//!
//! Each variant carries a human-readable message; `code()` exposes the stable
//! machine-readable code surfaced by front-ends.

use thiserror::Error;

/// All errors the engine surfaces across its public APIs.
#[derive(Debug, Error)]
pub enum RpgError {
    /// Missing LLM provider when required, invalid threshold, etc. Fatal at
    /// phase entry.
    #[error("configuration error: {0}")]
    Config(String),

    /// Graph id, file path, or entity not present.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input to a public operation.
    #[error("validation error: {0}")]
    Validation(String),

    /// AST parser could not recover. Non-fatal per file.
    #[error("parse error: {0}")]
    Parse(String),

    /// Transport failure or unparseable LLM output after retry.
    #[error("llm error: {0}")]
    Llm(String),

    /// Diff cannot be produced.
    #[error("vcs error: {0}")]
    Vcs(String),

    /// Backend failure. Fatal for the enclosing operation.
    #[error("store error: {0}")]
    Store(String),

    /// Neither embeddings nor keyword sets available for a modification.
    #[error("semantic drift unavailable: {0}")]
    DriftUnavailable(String),
}

impl RpgError {
    /// Stable error code for user-visible surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Llm(_) => "LLM_ERROR",
            Self::Vcs(_) => "VCS_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::DriftUnavailable(_) => "DRIFT_UNAVAILABLE",
        }
    }
}

impl From<serde_json::Error> for RpgError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<std::io::Error> for RpgError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(RpgError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(RpgError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(RpgError::Store("x".into()).code(), "STORE_ERROR");
        assert_eq!(
            RpgError::DriftUnavailable("x".into()).code(),
            "DRIFT_UNAVAILABLE"
        );
    }
}
