//! Error types for bonusmap.
//!
//! Library crates use [`BonusmapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// Overlay operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayOp {
    Load,
    Save,
}

impl fmt::Display for OverlayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("load"),
            Self::Save => f.write_str("save"),
        }
    }
}

/// Top-level error type for all bonusmap operations.
#[derive(Debug, thiserror::Error)]
pub enum BonusmapError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a program listing.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Overlay store failure. Always fatal for the run.
    #[error(
        "overlay {operation} failed for {} at {path:?}: {message}",
        .identifier.as_deref().unwrap_or("entire store")
    )]
    Overlay {
        operation: OverlayOp,
        identifier: Option<String>,
        path: PathBuf,
        message: String,
    },

    /// Export of the resolved record set failed.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input records, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BonusmapError>;

impl BonusmapError {
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

    /// Overlay failure covering the whole store (no single merchant at fault).
    pub fn overlay(operation: OverlayOp, path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Overlay {
            operation,
            identifier: None,
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Overlay failure attributed to one merchant identifier.
    pub fn overlay_entry(
        operation: OverlayOp,
        identifier: impl Into<String>,
        path: impl Into<PathBuf>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Overlay {
            operation,
            identifier: Some(identifier.into()),
            path: path.into(),
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BonusmapError::config("missing overlay path");
        assert_eq!(err.to_string(), "config error: missing overlay path");

        let err = BonusmapError::validation("record 3 has no program");
        assert!(err.to_string().contains("record 3"));
    }

    #[test]
    fn overlay_error_names_operation_and_scope() {
        let err = BonusmapError::overlay(OverlayOp::Load, "/tmp/o.json", "not a JSON object");
        let msg = err.to_string();
        assert!(msg.starts_with("overlay load failed for entire store"));
        assert!(msg.contains("not a JSON object"));

        let err = BonusmapError::overlay_entry(OverlayOp::Save, "acme-no", "/tmp/o.json", "boom");
        assert!(err.to_string().starts_with("overlay save failed for acme-no"));
    }
}
