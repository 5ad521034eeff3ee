//! # Domain Error Types
//!
//! Error types for the pure domain layer. The sync and storage crates wrap
//! these in their own error enums.

use thiserror::Error;

/// Result type alias for domain operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Domain-level errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Message type tag is empty, blank, or not in the registry.
    ///
    /// ## When This Occurs
    /// - A generic reading arrives with a null/blank type tag
    /// - An upstream producer sends an unregistered type id
    #[error("invalid message type id: '{0}'")]
    InvalidMessageType(String),

    /// Unknown category name (e.g. from config).
    #[error("unknown category: '{0}'")]
    UnknownCategory(String),

    /// Payload serialization failed.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidMessageType("".into());
        assert!(err.to_string().contains("invalid message type"));

        let err = CoreError::UnknownCategory("bogus".into());
        assert!(err.to_string().contains("bogus"));
    }
}
