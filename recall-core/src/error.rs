//! Error types for RECALL.
//!
//! These describe failures of the caching infrastructure only. A memoized
//! computation keeps its own error type, which the engine never wraps.

use thiserror::Error;

/// Result type alias using `RecallError`.
pub type Result<T> = std::result::Result<T, RecallError>;

/// Main error type for RECALL infrastructure.
#[derive(Debug, Error)]
pub enum RecallError {
    // ═══════════════════════════════════════════════════════════════════════════
    // KEY ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The computation has no bound inputs to derive a key from.
    #[error("Computation has no bound inputs to derive a key from")]
    NoBoundInputs,

    /// The bound inputs could not be encoded.
    #[error("Failed to encode bound inputs: {0}")]
    InputEncoding(String),

    /// An explicit key was rejected.
    #[error("Invalid computation key: {0}")]
    InvalidKey(String),

    /// The key already holds a value of another type.
    #[error("Key '{key}' holds a value of type {stored}, requested {requested}")]
    TypeMismatch {
        /// Key holding the value
        key: String,
        /// Type name of the stored value
        stored: &'static str,
        /// Type name the caller asked for
        requested: &'static str,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // DURABLE STORE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Backend-specific failure of the durable cache.
    #[error("Durable cache error: {0}")]
    StoreError(String),

    /// A stored entry could not be read back.
    #[error("Corrupt entry for key '{key}': {reason}")]
    CorruptEntry {
        /// Key whose entry was unreadable
        key: String,
        /// Why decoding failed
        reason: String,
    },

    /// The computation handed to the durable cache was invoked more than once.
    #[error("Computation was already consumed")]
    ComputationConsumed,

    /// The computation handed to the durable cache failed; its error is held by the caller.
    #[error("Computation failed")]
    ComputationFailed,

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RecallError {
    /// Returns true if the error originates in a durable store.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            RecallError::StoreError(_)
                | RecallError::CorruptEntry { .. }
                | RecallError::IoError(_)
                | RecallError::JsonError(_)
        )
    }

    /// Returns true if the error prevents deriving or using a key.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            RecallError::NoBoundInputs
                | RecallError::InputEncoding(_)
                | RecallError::InvalidKey(_)
                | RecallError::TypeMismatch { .. }
        )
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RecallError::StoreError(_) | RecallError::IoError(_))
    }
}
