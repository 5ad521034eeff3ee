//! # pulse-db: Record Store for Pulse
//!
//! Durable, per-category buffer of telemetry records. Every reading is
//! written here first; the sync engine drains it and flips the `synced`
//! flag only after the server acknowledges receipt.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pulse Data Flow                                 │
//! │                                                                         │
//! │  Sensor collaborator → save(record)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     pulse-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  RecordStore  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ append        │    │ 001_init.sql │  │   │
//! │  │   │ WAL mode      │    │ unsynced      │    │              │  │   │
//! │  │   │               │    │ mark_synced   │    │              │  │   │
//! │  │   └───────────────┘    │ purge         │    └──────────────┘  │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (one table per category, partial index on synced = 0)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - The `RecordStore` repository
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulse_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/pulse.db")).await?;
//! let store = db.records();
//!
//! store.append(&record).await?;
//! let pending = store.unsynced(Category::Gps, 50).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::records::RecordStore;
