//! # Wire Protocol Frames
//!
//! Frame types for the bidirectional socket to the ingestion service.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Realtime Protocol Frames                           │
//! │                                                                         │
//! │  OUTBOUND (client → server)                                            │
//! │  ──────────────────────────                                            │
//! │  data               { payload: { message_type_id, data } }             │
//! │  heartbeat          low-frequency presence signal (1s)                 │
//! │  health_check_pong  reply to a server health_check_ping                │
//! │  device_register    re-announces the device id after connect           │
//! │                                                                         │
//! │  INBOUND (server → client)                                             │
//! │  ─────────────────────────                                             │
//! │  connection_established   handshake confirmation                       │
//! │  health_check_ping        liveness probe (client must pong, never     │
//! │                           initiates pings itself)                      │
//! │  pong                     liveness signal                              │
//! │  data_ack / audio_ack     carries the original message id →           │
//! │                           mark_synced                                  │
//! │  error / data_error       logged, non-fatal                            │
//! │  heartbeat_ack            informational only, does NOT feed liveness   │
//! │  device_registered        registration confirmation                    │
//! │                                                                         │
//! │  ENVELOPE (every outbound frame)                                       │
//! │  ───────────────────────────────                                       │
//! │  { "id": "...", "type": "...", "payload": {...},                       │
//! │    "metadata": { "device_id": "...", "source": "..." },                │
//! │    "timestamp": "<RFC3339>" }                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Outbound serialization is hand-written per frame kind so the wire
//! contract stays exact rather than incidentally derived from struct
//! field names. A `data` frame's id IS the record id - that is the
//! idempotency key the server echoes back in `data_ack`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use pulse_core::{MessageTypeRegistry, Record};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Outbound Frames
// =============================================================================

/// Outbound frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    /// A telemetry record.
    Data,
    /// Client presence signal.
    Heartbeat,
    /// Reply to a server health_check_ping.
    HealthCheckPong,
    /// Device id re-announcement after connect.
    DeviceRegister,
}

impl OutboundKind {
    /// The wire `type` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::Data => "data",
            OutboundKind::Heartbeat => "heartbeat",
            OutboundKind::HealthCheckPong => "health_check_pong",
            OutboundKind::DeviceRegister => "device_register",
        }
    }
}

impl std::fmt::Display for OutboundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope metadata carried by every outbound frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Owning device.
    pub device_id: String,
    /// Producer tag (e.g. "mobile", "wearable").
    pub source: String,
}

/// A fully-formed outbound frame, ready for the dispatcher queue.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Unique message id. For `data` frames this is the record id.
    pub id: String,
    /// Frame kind.
    pub kind: OutboundKind,
    /// Kind-specific payload.
    pub payload: Value,
    /// Envelope metadata.
    pub metadata: FrameMetadata,
    /// Send timestamp (RFC3339).
    pub timestamp: chrono::DateTime<Utc>,
}

impl OutboundFrame {
    /// Builds a `data` frame for one record.
    ///
    /// The record's type tag is validated here, before the frame can reach
    /// the dispatcher queue - a blank or unregistered tag never produces a
    /// frame.
    pub fn data(
        record: &Record,
        registry: &MessageTypeRegistry,
        metadata: FrameMetadata,
    ) -> SyncResult<Self> {
        record.payload.validate(registry)?;

        let type_id = record.payload.message_type_id();
        if !registry.is_valid(type_id) {
            return Err(SyncError::InvalidMessageType(type_id.to_string()));
        }

        let data = record.payload.to_wire_data()?;
        Ok(OutboundFrame {
            id: record.id.clone(),
            kind: OutboundKind::Data,
            payload: json!({
                "message_type_id": type_id,
                "data": data,
            }),
            metadata,
            timestamp: Utc::now(),
        })
    }

    /// Builds a heartbeat frame.
    pub fn heartbeat(metadata: FrameMetadata) -> Self {
        OutboundFrame {
            id: Uuid::new_v4().to_string(),
            kind: OutboundKind::Heartbeat,
            payload: json!({}),
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Builds a health_check_pong echoing the ping id.
    pub fn health_check_pong(ping_id: Option<&str>, metadata: FrameMetadata) -> Self {
        OutboundFrame {
            id: Uuid::new_v4().to_string(),
            kind: OutboundKind::HealthCheckPong,
            payload: json!({ "ping_id": ping_id }),
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Builds a device_register frame.
    pub fn device_register(metadata: FrameMetadata) -> Self {
        let device_id = metadata.device_id.clone();
        OutboundFrame {
            id: Uuid::new_v4().to_string(),
            kind: OutboundKind::DeviceRegister,
            payload: json!({ "device_id": device_id }),
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Serializes to the exact wire JSON.
    pub fn to_json(&self) -> String {
        json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "payload": self.payload,
            "metadata": {
                "device_id": self.metadata.device_id,
                "source": self.metadata.source,
            },
            "timestamp": self.timestamp.to_rfc3339(),
        })
        .to_string()
    }
}

// =============================================================================
// Inbound Frames
// =============================================================================

/// Inbound frame kinds consumed from the server.
///
/// Unknown kinds deserialize to [`InboundFrame::Unknown`] and are logged
/// rather than breaking the read loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Handshake confirmation.
    ConnectionEstablished,

    /// Server liveness probe; must trigger an immediate pong echoing the
    /// ping id.
    HealthCheckPing {
        #[serde(default)]
        id: Option<String>,
    },

    /// Liveness signal.
    Pong,

    /// Data acknowledgment, keyed by the original message id.
    DataAck { message_id: String },

    /// Audio acknowledgment; same semantics as data_ack.
    AudioAck { message_id: String },

    /// Server-reported error. Logged, non-fatal.
    Error {
        #[serde(default)]
        message: Option<String>,
    },

    /// Server-reported data error. Logged, non-fatal; the record stays
    /// unsynced and is retried next pass.
    DataError {
        #[serde(default)]
        message: Option<String>,
    },

    /// Heartbeat acknowledgment. Informational only; does not feed
    /// liveness.
    HeartbeatAck,

    /// Device registration confirmation.
    DeviceRegistered,

    /// Any frame kind this client doesn't know.
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    /// Deserializes from wire JSON.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::DeserializationFailed(e.to_string()))
    }

    /// The frame kind name (for logging).
    pub fn kind_name(&self) -> &'static str {
        match self {
            InboundFrame::ConnectionEstablished => "connection_established",
            InboundFrame::HealthCheckPing { .. } => "health_check_ping",
            InboundFrame::Pong => "pong",
            InboundFrame::DataAck { .. } => "data_ack",
            InboundFrame::AudioAck { .. } => "audio_ack",
            InboundFrame::Error { .. } => "error",
            InboundFrame::DataError { .. } => "data_error",
            InboundFrame::HeartbeatAck => "heartbeat_ack",
            InboundFrame::DeviceRegistered => "device_registered",
            InboundFrame::Unknown => "unknown",
        }
    }

    /// The acknowledged message id, if this frame is an ack.
    pub fn ack_message_id(&self) -> Option<&str> {
        match self {
            InboundFrame::DataAck { message_id } | InboundFrame::AudioAck { message_id } => {
                Some(message_id)
            }
            _ => None,
        }
    }

    /// True if this frame counts as server liveness evidence.
    ///
    /// Only server-originated pings and pongs qualify; heartbeat_ack is
    /// informational by contract.
    pub fn is_liveness_signal(&self) -> bool {
        matches!(
            self,
            InboundFrame::HealthCheckPing { .. } | InboundFrame::Pong
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
