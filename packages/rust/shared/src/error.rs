//! Error types for RegCrawler.
//!
//! Library crates use [`RegCrawlerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all RegCrawler operations.
#[derive(Debug, thiserror::Error)]
pub enum RegCrawlerError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the listing or a document.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Summarization call failed (transport, API status, or response body).
    #[error("summarization error: {0}")]
    Summarize(String),

    /// The operation was interrupted by the shutdown signal.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad template, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Report export error.
    #[error("export error: {0}")]
    Export(String),

    /// A pipeline task panicked or was aborted.
    #[error("task error: {0}")]
    Task(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RegCrawlerError>;

impl RegCrawlerError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RegCrawlerError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = RegCrawlerError::Summarize("Gemini API returned HTTP 429".into());
        assert!(err.to_string().contains("429"));

        assert_eq!(RegCrawlerError::Cancelled.to_string(), "operation cancelled");
    }
}
