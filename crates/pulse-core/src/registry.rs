//! # Message Type Registry
//!
//! Static whitelist of wire message type ids.
//!
//! ## Why a Gate Exists
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Validation Gate Placement                           │
//! │                                                                         │
//! │  A malformed upstream producer once shipped readings with a null        │
//! │  type tag. The server rejected the resulting frame outright and the     │
//! │  whole sync pass stalled behind it. The registry is checked at three    │
//! │  independent points so bad data is contained, not propagated:           │
//! │                                                                         │
//! │  1. before persisting a generic/untyped reading                         │
//! │  2. before building an outbound data frame                              │
//! │  3. when replaying persisted generic records during sync                │
//! │                                                                         │
//! │  Each gate rejects independently; a record that slips past one gate     │
//! │  (e.g. written by an older build) is still stopped at the next.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// Canonical category type ids.
const CANONICAL_TYPES: &[&str] = &[
    "heart_rate",
    "gps",
    "sleep_state",
    "power_event",
    "on_body_status",
];

// Registered generic subtypes carried through the `Other` payload arm.
const GENERIC_TYPES: &[&str] = &[
    "accelerometer",
    "audio",
    "screen_text",
    "app_lifecycle",
];

/// Static whitelist mapping category names to wire type identifiers.
#[derive(Debug, Clone, Default)]
pub struct MessageTypeRegistry;

impl MessageTypeRegistry {
    /// Creates the registry.
    pub fn new() -> Self {
        MessageTypeRegistry
    }

    /// Returns true if `type_id` is a registered wire type.
    ///
    /// Empty and whitespace-only ids are always invalid.
    pub fn is_valid(&self, type_id: &str) -> bool {
        let trimmed = type_id.trim();
        if trimmed.is_empty() {
            return false;
        }
        CANONICAL_TYPES.contains(&trimmed) || GENERIC_TYPES.contains(&trimmed)
    }

    /// All registered type ids (canonical first, then generic subtypes).
    pub fn known_types(&self) -> impl Iterator<Item = &'static str> {
        CANONICAL_TYPES.iter().chain(GENERIC_TYPES.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_types_are_valid() {
        let registry = MessageTypeRegistry::new();
        for id in ["heart_rate", "gps", "sleep_state", "power_event", "on_body_status"] {
            assert!(registry.is_valid(id), "{id} should be registered");
        }
    }

    #[test]
    fn test_generic_subtypes_are_valid() {
        let registry = MessageTypeRegistry::new();
        for id in ["accelerometer", "audio", "screen_text", "app_lifecycle"] {
            assert!(registry.is_valid(id), "{id} should be registered");
        }
    }

    #[test]
    fn test_blank_and_unknown_are_invalid() {
        let registry = MessageTypeRegistry::new();
        assert!(!registry.is_valid(""));
        assert!(!registry.is_valid("   "));
        assert!(!registry.is_valid("\t\n"));
        assert!(!registry.is_valid("definitely_not_registered"));
        assert!(!registry.is_valid("Heart_Rate")); // case-sensitive
    }

    #[test]
    fn test_known_types_enumeration() {
        let registry = MessageTypeRegistry::new();
        let all: Vec<_> = registry.known_types().collect();
        assert_eq!(all.len(), 9);
        assert!(all.contains(&"gps"));
        assert!(all.contains(&"screen_text"));
    }
}
