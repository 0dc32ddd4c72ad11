//! Unified error handling for HBM repair
//!
//! This crate provides the single error type used across all repair components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using HbmRepairError
pub type Result<T> = std::result::Result<T, HbmRepairError>;

/// Unified error type for all HBM repair operations
#[derive(thiserror::Error, Debug)]
pub enum HbmRepairError {
    // ============================================================================
    // Capability Errors (abort before any hardware access)
    // ============================================================================
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported HBM model: {0}")]
    UnsupportedModel(String),

    // ============================================================================
    // Repair Errors (abort only the current repair)
    // ============================================================================
    #[error("No spare resource available for {location}")]
    SpareResourceExhausted {
        location: String,
    },

    #[error("Already repaired: {location}")]
    AlreadyRepaired {
        location: String,
    },

    #[error("Row repair burned in one pseudo-channel only for {location}: {detail}")]
    PartialRowRepair {
        location: String,
        detail: String,
    },

    #[error("Verification mismatch for {location}: expected {expected} spare(s) consumed, observed {actual}")]
    VerificationMismatch {
        location: String,
        expected: i64,
        actual: i64,
    },

    // ============================================================================
    // Transport Errors
    // ============================================================================
    #[error("Scan transport error: {0}")]
    Transport(String),

    #[error("Scan transport hard failure: {0}")]
    TransportHardFailure(String),

    #[error("Scan chain lock is already held")]
    ScanLockHeld,

    // ============================================================================
    // Encoding and Addressing Errors
    // ============================================================================
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid remap value {value:#06x}: {reason}")]
    InvalidRemapValue {
        value: u16,
        reason: String,
    },

    #[error("Invalid fuse data {value:#x}: {reason}")]
    InvalidFuseData {
        value: u64,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl HbmRepairError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a recoverable transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// Create an invalid coordinate error
    pub fn invalid_coordinate(msg: impl Into<String>) -> Self {
        Self::InvalidCoordinate(msg.into())
    }

    /// Create an invalid fuse data error
    pub fn invalid_fuse(value: u64, reason: impl Into<String>) -> Self {
        Self::InvalidFuseData {
            value,
            reason: reason.into(),
        }
    }

    /// Whether this error must stop a whole batch instead of just the current repair.
    ///
    /// Catalog and model resolution failures, and hard transport failures,
    /// mean no further coordinate can be attempted safely.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperation(_) | Self::UnsupportedModel(_) | Self::TransportHardFailure(_)
        )
    }
}

// Allow converting from String to HbmRepairError
impl From<String> for HbmRepairError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to HbmRepairError
impl From<&str> for HbmRepairError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_fatal_classification() {
        assert!(HbmRepairError::unsupported("HARD_LANE_REPAIR").is_batch_fatal());
        assert!(HbmRepairError::UnsupportedModel("Micron HBM2".into()).is_batch_fatal());
        assert!(HbmRepairError::TransportHardFailure("chain stuck".into()).is_batch_fatal());

        assert!(!HbmRepairError::transport("timeout").is_batch_fatal());
        assert!(!HbmRepairError::SpareResourceExhausted { location: "x".into() }.is_batch_fatal());
        assert!(!HbmRepairError::AlreadyRepaired { location: "x".into() }.is_batch_fatal());
        assert!(!HbmRepairError::PartialRowRepair {
            location: "x".into(),
            detail: "pc1".into()
        }
        .is_batch_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = HbmRepairError::VerificationMismatch {
            location: "site 0".into(),
            expected: 1,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "Verification mismatch for site 0: expected 1 spare(s) consumed, observed 0"
        );

        let err = HbmRepairError::InvalidRemapValue { value: 0xFF12, reason: "bad nibble".into() };
        assert_eq!(err.to_string(), "Invalid remap value 0xff12: bad nibble");
    }

    #[test]
    fn test_from_str() {
        let err: HbmRepairError = "boom".into();
        assert!(matches!(err, HbmRepairError::Generic(ref s) if s == "boom"));
    }
}
