//! Error types for qe-prefs.
//!
//! Taxonomy:
//! - Input faults: malformed lines and incomplete records are recovered by the
//!   readers and never reach this type
//! - Oracle faults: swallowed per batch by the scoring driver
//! - Sink and usage faults: propagate and end the run

use thiserror::Error;

/// Top-level error type for qe-prefs.
#[derive(Debug, Error)]
pub enum PrefsError {
    // ═══════════════════════════════════════════════════════════════════
    // CONFIGURATION: expected failures
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // ORACLE BOUNDARY: scoring service faults
    // ═══════════════════════════════════════════════════════════════════
    #[error("Scoring oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // ═══════════════════════════════════════════════════════════════════
    // PERSISTENCE: fatal for the run
    // ═══════════════════════════════════════════════════════════════════
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised at the scoring oracle boundary.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Score count mismatch: sent {expected} tasks, got {got} scores")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Refusing to score an empty batch")]
    EmptyBatch,
}

impl PrefsError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for qe-prefs.
pub type Result<T> = std::result::Result<T, PrefsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_names_both_counts() {
        let err = PrefsError::from(OracleError::LengthMismatch {
            expected: 4,
            got: 3,
        });
        assert_eq!(
            err.to_string(),
            "Scoring oracle error: Score count mismatch: sent 4 tasks, got 3 scores"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = PrefsError::io("writing scored task", std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "IO error: writing scored task");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk full"));
    }
}
