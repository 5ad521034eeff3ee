//! # Sync Error Types
//!
//! Error types for the sync engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidMessageType     │ │
//! │  │  MissingDeviceId│  │  Disconnected   │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  DeserializationFailed  │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Transport failures recover via reconnect and are never surfaced to    │
//! │  the caller; everything degrades to "data stays buffered locally and   │
//! │  will be retried".                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID (assigned by the out-of-band registration call).
    #[error("device ID not configured; run device registration first")]
    MissingDeviceId,

    /// Invalid ingest URL.
    #[error("invalid ingest URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to establish WebSocket connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Socket disconnected unexpectedly.
    #[error("disconnected from ingestion service")]
    Disconnected,

    /// Connection timeout.
    #[error("connection timeout after {0} seconds")]
    Timeout(u64),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Message type tag is blank or not in the registry.
    #[error("invalid message type id: '{0}'")]
    InvalidMessageType(String),

    /// Failed to serialize an outbound frame.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to deserialize an inbound frame.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Record store operation failed.
    #[error("record store error: {0}")]
    StoreError(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed (queue closed during shutdown).
    #[error("channel error: {0}")]
    ChannelError(String),

    /// Engine is shutting down.
    #[error("sync engine is shutting down")]
    ShuttingDown,

    /// Internal sync engine error.
    #[error("internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<pulse_db::DbError> for SyncError {
    fn from(err: pulse_db::DbError) -> Self {
        SyncError::StoreError(err.to_string())
    }
}

impl From<pulse_core::CoreError> for SyncError {
    fn from(err: pulse_core::CoreError) -> Self {
        match err {
            pulse_core::CoreError::InvalidMessageType(tag) => SyncError::InvalidMessageType(tag),
            other => SyncError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed => SyncError::Disconnected,
            WsError::AlreadyClosed => SyncError::Disconnected,
            WsError::Protocol(p) => SyncError::WebSocketError(p.to_string()),
            WsError::Io(io) => SyncError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => SyncError::TlsError(tls.to_string()),
            other => SyncError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error is recoverable and the operation can be
    /// retried (by the reconnect loop or the next sync pass).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Disconnected
                | SyncError::Timeout(_)
                | SyncError::WebSocketError(_)
                | SyncError::StoreError(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Disconnected.is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingDeviceId.is_retryable());
        assert!(!SyncError::InvalidMessageType("".into()).is_retryable());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: SyncError = pulse_core::CoreError::InvalidMessageType("bogus".into()).into();
        assert!(matches!(err, SyncError::InvalidMessageType(tag) if tag == "bogus"));
    }
}
