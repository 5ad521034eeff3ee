//! # pulse-core: Pure Domain Types for Pulse
//!
//! This crate defines the telemetry domain model shared by the record store
//! and the sync engine. It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pulse Data Flow                                 │
//! │                                                                         │
//! │  Sensor collaborator                                                   │
//! │       │  Record::new(device_id, payload)                               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pulse-core (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌─────────────────┐  │   │
//! │  │   │    Record     │   │   Category    │   │    Registry     │  │   │
//! │  │   │  (types.rs)   │   │  (types.rs)   │   │  (registry.rs)  │  │   │
//! │  │   │               │   │               │   │                 │  │   │
//! │  │   │ id, device_id │   │ HeartRate     │   │ message type    │  │   │
//! │  │   │ recorded_at   │   │ Gps           │   │ whitelist +     │  │   │
//! │  │   │ payload       │   │ SleepState    │   │ tag validation  │  │   │
//! │  │   │ synced flag   │   │ PowerEvent    │   │                 │  │   │
//! │  │   └───────────────┘   │ Generic       │   └─────────────────┘  │   │
//! │  │                       └───────────────┘                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pulse-db (durable buffer)          pulse-sync (wire frames)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`types`] - `Record`, `RecordPayload`, `Category`
//! - [`registry`] - static message type whitelist and tag validation
//! - [`error`] - domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod registry;
pub mod types;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use registry::MessageTypeRegistry;
pub use types::{Category, Record, RecordPayload};
