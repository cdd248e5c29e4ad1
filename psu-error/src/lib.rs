//! Unified error handling for psumon
//!
//! This crate provides the single error type surfaced by the psumon engine and daemon.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.
//!
//! Bus-level failures never show up here: the poll engine absorbs them into the
//! fail-safe snapshot. What reaches a caller is validation and configuration trouble.

use std::io;
use std::path::PathBuf;

/// Result type alias using PsuError
pub type Result<T> = std::result::Result<T, PsuError>;

/// Unified error type for all psumon operations
#[derive(thiserror::Error, Debug)]
pub enum PsuError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to open bus {path}: {source}")]
    BusOpen {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Unknown chip variant: {0}")]
    UnknownVariant(String),

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Invalid fan duty cycle: {value} (must be 0-100)")]
    InvalidDutyCycle {
        value: i64,
    },

    #[error("Invalid access interval: {value} (must be 0-120)")]
    InvalidAccessInterval {
        value: i64,
    },

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Attribute is read-only: {0}")]
    ReadOnlyAttribute(String),

    #[error("Invalid attribute value for {attribute}: {value:?}")]
    InvalidAttributeValue {
        attribute: String,
        value: String,
    },
}

impl PsuError {
    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by out-of-range input to a setter
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDutyCycle { .. }
                | Self::InvalidAccessInterval { .. }
                | Self::InvalidAttributeValue { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PsuError::InvalidDutyCycle { value: 101 };
        assert_eq!(err.to_string(), "Invalid fan duty cycle: 101 (must be 0-100)");

        let err = PsuError::InvalidAccessInterval { value: 150 };
        assert_eq!(err.to_string(), "Invalid access interval: 150 (must be 0-120)");

        let err = PsuError::invalid_config("address", "must be a 7-bit address");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for address: must be a 7-bit address"
        );
    }

    #[test]
    fn test_is_validation() {
        assert!(PsuError::InvalidDutyCycle { value: -1 }.is_validation());
        assert!(PsuError::InvalidAccessInterval { value: 121 }.is_validation());
        assert!(!PsuError::UnknownVariant("ym9999".into()).is_validation());
    }

    #[test]
    fn test_from_io() {
        let err: PsuError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PsuError::Io(_)));
    }
}
