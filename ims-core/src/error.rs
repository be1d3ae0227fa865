//! Error types for IMS provisioning.
//!
//! This module provides the error hierarchy shared by every IMS crate using `thiserror`.
//! Backend failures are always surfaced as transport errors so callers can tell
//! them apart from local validation or storage problems.

use thiserror::Error;

use crate::types::{FeatureKey, OperationStatus};

/// Result type alias using `ImsError`.
pub type Result<T> = std::result::Result<T, ImsError>;

/// Main error type for all IMS provisioning operations.
#[derive(Debug, Error)]
pub enum ImsError {
    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSPORT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The remote call did not complete (connection lost, remote exception).
    #[error("Transport error during {operation}: {reason}")]
    Transport {
        /// Backend operation that was attempted.
        operation: &'static str,
        /// Description reported by the transport.
        reason: String,
    },

    /// The remote call completed but reported a status other than success.
    #[error("{operation} for {key} returned status {status}")]
    OperationFailed {
        /// Backend operation that was attempted.
        operation: &'static str,
        /// Key the operation addressed.
        key: FeatureKey,
        /// Status reported by the backend.
        status: OperationStatus,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A feature key name or number could not be parsed.
    #[error("Invalid feature key: {0}")]
    InvalidFeatureKey(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A store file is truncated or carries the wrong header.
    #[error("Store format error: {0}")]
    StoreFormat(String),

    /// Store file version mismatch.
    #[error("Store version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this build writes.
        expected: u8,
        /// Version found on disk.
        actual: u8,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ImsError {
    /// Builds a transport error for `operation`.
    pub fn transport(operation: &'static str, reason: impl Into<String>) -> Self {
        ImsError::Transport {
            operation,
            reason: reason.into(),
        }
    }

    /// Returns true if the failure came from the remote provisioning service.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ImsError::Transport { .. } | ImsError::OperationFailed { .. }
        )
    }

    /// Returns true if the caller may retry the same request.
    ///
    /// Only connection-level failures qualify; a backend that answered with a
    /// failure status will answer the same way again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ImsError::Transport { .. })
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, ImsError::InvalidFeatureKey(_))
    }
}
