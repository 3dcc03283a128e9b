//! Error types for Harvester.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Harvester operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required input (topic, candidate link) was absent.
    #[error("missing input: {what}")]
    MissingInput { what: String },

    /// A collaborator call (search, download, extract, convert, upload) failed.
    #[error("{service} call failed: {message}")]
    ExternalCall { service: String, message: String },

    /// Network/HTTP error before a collaborator produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed field in an upstream payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Object storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A raw record failed validation (e.g. an unparsable link).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Content-to-text conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a missing-input error naming what was absent.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingInput { what: what.into() }
    }

    /// Create a collaborator-call error.
    pub fn external(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExternalCall {
            service: service.into(),
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
        let err = HarvestError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = HarvestError::external("search", "HTTP 500");
        assert_eq!(err.to_string(), "search call failed: HTTP 500");

        let err = HarvestError::missing("research topic");
        assert!(err.to_string().contains("research topic"));
    }
}
