//! # Telemetry Record Types
//!
//! The record model for the store-and-forward buffer.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Record Lifecycle                                │
//! │                                                                         │
//! │  Sensor reading                                                        │
//! │       │  Record::new() → id assigned, synced = false                   │
//! │       ▼                                                                 │
//! │  Record Store (durable, per-category table)                            │
//! │       │                                                                 │
//! │       │  Sync Scheduler sends as data frame                            │
//! │       ▼                                                                 │
//! │  Server ack (data_ack { message_id = record id })                      │
//! │       │  mark_synced → synced = true (never reset)                     │
//! │       ▼                                                                 │
//! │  Retention Sweeper deletes once created_at < retention horizon         │
//! │                                                                         │
//! │  INVARIANTS:                                                           │
//! │  • visible to the scheduler iff synced = false                         │
//! │  • synced records are never re-sent                                    │
//! │  • id is globally unique per device (ack matching is unambiguous)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::registry::MessageTypeRegistry;

// =============================================================================
// Category
// =============================================================================

/// Telemetry categories, one per durable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Heart rate samples from the wearable.
    HeartRate,

    /// GPS fixes from the phone.
    Gps,

    /// Inferred sleep state transitions.
    SleepState,

    /// Battery/charging events.
    PowerEvent,

    /// Everything else: readings carrying a registered type tag and an
    /// opaque JSON payload (accelerometer, audio, screen text, ...).
    Generic,
}

impl Category {
    /// All categories, in sync-pass order.
    pub const ALL: [Category; 5] = [
        Category::HeartRate,
        Category::Gps,
        Category::SleepState,
        Category::PowerEvent,
        Category::Generic,
    ];

    /// Canonical name, used in config files and log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Category::HeartRate => "heart_rate",
            Category::Gps => "gps",
            Category::SleepState => "sleep_state",
            Category::PowerEvent => "power_event",
            Category::Generic => "generic",
        }
    }

    /// The durable table backing this category.
    pub fn table(&self) -> &'static str {
        match self {
            Category::HeartRate => "heart_rate_records",
            Category::Gps => "gps_records",
            Category::SleepState => "sleep_state_records",
            Category::PowerEvent => "power_event_records",
            Category::Generic => "generic_records",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart_rate" => Ok(Category::HeartRate),
            "gps" => Ok(Category::Gps),
            "sleep_state" => Ok(Category::SleepState),
            "power_event" => Ok(Category::PowerEvent),
            "generic" => Ok(Category::Generic),
            other => Err(CoreError::UnknownCategory(other.to_string())),
        }
    }
}

// =============================================================================
// Record Payload (Tagged Variant)
// =============================================================================

/// Category-specific payload, one variant per durable table.
///
/// The `Other` arm carries the declared type tag alongside the raw JSON so
/// tag validation is an exhaustive match plus a registry lookup, not a
/// stringly-typed special case scattered through the sync path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RecordPayload {
    /// Heart rate sample.
    HeartRate { bpm: f64, confidence: f64 },

    /// GPS fix.
    Gps {
        latitude: f64,
        longitude: f64,
        altitude: f64,
        accuracy: f64,
        heading: f64,
        speed: f64,
    },

    /// Sleep state inference.
    SleepState {
        state: String,
        confidence: f64,
        duration_secs: i64,
    },

    /// Battery/charging event.
    PowerEvent {
        battery_level: f64,
        charging: bool,
        event_type: String,
    },

    /// Generic reading: registered type tag + opaque JSON payload.
    Other {
        message_type_id: String,
        data: serde_json::Value,
    },
}

impl RecordPayload {
    /// The category (and therefore the table) this payload belongs to.
    pub fn category(&self) -> Category {
        match self {
            RecordPayload::HeartRate { .. } => Category::HeartRate,
            RecordPayload::Gps { .. } => Category::Gps,
            RecordPayload::SleepState { .. } => Category::SleepState,
            RecordPayload::PowerEvent { .. } => Category::PowerEvent,
            RecordPayload::Other { .. } => Category::Generic,
        }
    }

    /// The wire `message_type_id` for this payload.
    ///
    /// Typed variants map to their canonical registry id; `Other` carries
    /// its declared tag, which may or may not be valid - see
    /// [`RecordPayload::validate`].
    pub fn message_type_id(&self) -> &str {
        match self {
            RecordPayload::HeartRate { .. } => "heart_rate",
            RecordPayload::Gps { .. } => "gps",
            RecordPayload::SleepState { .. } => "sleep_state",
            RecordPayload::PowerEvent { .. } => "power_event",
            RecordPayload::Other {
                message_type_id, ..
            } => message_type_id,
        }
    }

    /// Validates the payload's type tag against the registry.
    ///
    /// Typed variants are valid by construction; only `Other` can fail.
    pub fn validate(&self, registry: &MessageTypeRegistry) -> CoreResult<()> {
        match self {
            RecordPayload::Other {
                message_type_id, ..
            } => {
                if registry.is_valid(message_type_id) {
                    Ok(())
                } else {
                    Err(CoreError::InvalidMessageType(message_type_id.clone()))
                }
            }
            _ => Ok(()),
        }
    }

    /// Serializes the payload fields (without the category tag) to the
    /// `data` object of an outbound frame.
    pub fn to_wire_data(&self) -> CoreResult<serde_json::Value> {
        let value = match self {
            RecordPayload::Other { data, .. } => data.clone(),
            typed => {
                // Strip the serde category tag: the wire `data` object is
                // only the payload fields, the tag travels as
                // `message_type_id`.
                let mut value = serde_json::to_value(typed)?;
                if let Some(map) = value.as_object_mut() {
                    map.remove("category");
                }
                value
            }
        };
        Ok(value)
    }
}

// =============================================================================
// Record
// =============================================================================

/// One persisted sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable unique identifier (UUID v4), assigned at creation.
    /// Doubles as the idempotency key for ack matching.
    pub id: String,

    /// Owning device.
    pub device_id: String,

    /// Capture time.
    pub recorded_at: DateTime<Utc>,

    /// Category-specific payload.
    pub payload: RecordPayload,

    /// False at creation; set true only after a matching server ack.
    /// Never reset to false.
    pub synced: bool,

    /// Local insertion time: retention clock and unsynced-queue order key.
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Creates a new unsynced record captured now.
    pub fn new(device_id: impl Into<String>, payload: RecordPayload) -> Self {
        let now = Utc::now();
        Record {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            recorded_at: now,
            payload,
            synced: false,
            created_at: now,
        }
    }

    /// Creates a record with an explicit capture time (e.g. backfilled
    /// sensor data delivered late).
    pub fn with_recorded_at(
        device_id: impl Into<String>,
        recorded_at: DateTime<Utc>,
        payload: RecordPayload,
    ) -> Self {
        Record {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            recorded_at,
            payload,
            synced: false,
            created_at: Utc::now(),
        }
    }

    /// The category (and table) this record belongs to.
    pub fn category(&self) -> Category {
        self.payload.category()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_is_unsynced() {
        let record = Record::new(
            "dev-1",
            RecordPayload::HeartRate {
                bpm: 62.0,
                confidence: 0.97,
            },
        );
        assert!(!record.synced);
        assert_eq!(record.category(), Category::HeartRate);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn test_record_ids_are_unique() {
        let a = Record::new("dev-1", RecordPayload::Gps {
            latitude: 37.0,
            longitude: -122.0,
            altitude: 12.0,
            accuracy: 5.0,
            heading: 0.0,
            speed: 1.2,
        });
        let b = Record::new("dev-1", RecordPayload::Gps {
            latitude: 37.0,
            longitude: -122.0,
            altitude: 12.0,
            accuracy: 5.0,
            heading: 0.0,
            speed: 1.2,
        });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_category_round_trip() {
        for category in Category::ALL {
            let parsed: Category = category.name().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("bogus".parse::<Category>().is_err());
    }

    #[test]
    fn test_wire_data_strips_category_tag() {
        let payload = RecordPayload::SleepState {
            state: "rem".into(),
            confidence: 0.8,
            duration_secs: 5400,
        };
        let data = payload.to_wire_data().unwrap();
        assert_eq!(data["state"], "rem");
        assert!(data.get("category").is_none());
    }

    #[test]
    fn test_other_wire_data_is_passthrough() {
        let payload = RecordPayload::Other {
            message_type_id: "screen_text".into(),
            data: json!({"text": "hello", "app": "browser"}),
        };
        assert_eq!(payload.to_wire_data().unwrap()["text"], "hello");
        assert_eq!(payload.message_type_id(), "screen_text");
    }

    #[test]
    fn test_validate_other_against_registry() {
        let registry = MessageTypeRegistry::new();

        let valid = RecordPayload::Other {
            message_type_id: "accelerometer".into(),
            data: json!({"x": 0.1}),
        };
        assert!(valid.validate(&registry).is_ok());

        let unknown = RecordPayload::Other {
            message_type_id: "not_registered".into(),
            data: json!({}),
        };
        assert!(unknown.validate(&registry).is_err());

        let blank = RecordPayload::Other {
            message_type_id: "  ".into(),
            data: json!({}),
        };
        assert!(blank.validate(&registry).is_err());
    }
}
