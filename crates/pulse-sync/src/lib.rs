//! # pulse-sync: Store-and-Forward Sync Engine for Pulse
//!
//! This crate keeps one live WebSocket to the ingestion service and
//! reconciles the durable record buffer against server acknowledgments.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    SyncAgent (composition root)                  │  │
//! │  │        Spawns and wires every component; no globals.             │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │     ┌──────────────┬──────────┼──────────────┬──────────────┐          │
//! │     ▼              ▼          ▼              ▼              ▼           │
//! │  ┌────────┐  ┌──────────┐  ┌─────────┐  ┌─────────┐  ┌───────────┐    │
//! │  │Conn.   │  │Dispatcher│  │Scheduler│  │Sweeper  │  │ Intake    │    │
//! │  │Manager │  │          │  │         │  │         │  │ (sink)    │    │
//! │  │        │  │ one      │  │ batch   │  │ purge   │  │           │    │
//! │  │socket, │  │ writer,  │  │ drain,  │  │ synced  │  │ save +    │    │
//! │  │liveness│  │ FIFO,    │  │ pacing, │  │ past    │  │ fast-path │    │
//! │  │backoff │  │ drop if  │  │ ack →   │  │ horizon │  │ send      │    │
//! │  │        │  │ offline  │  │ synced  │  │         │  │           │    │
//! │  └────────┘  └──────────┘  └─────────┘  └─────────┘  └───────────┘    │
//! │                                                                         │
//! │  CONCURRENCY MODEL                                                     │
//! │  ─────────────────                                                     │
//! │  Independent tokio tasks cooperating over channels and watch state.    │
//! │  The socket is owned by the Connection Manager and written to only     │
//! │  by the Dispatcher worker. The record store has its own pool.          │
//! │                                                                         │
//! │  FAILURE MODEL                                                         │
//! │  ─────────────                                                         │
//! │  Nothing here surfaces a hard failure: every failure mode degrades     │
//! │  to "data stays buffered locally and will be retried".                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - `SyncAgent` composition root and `TelemetrySink` intake
//! - [`config`] - sync configuration (device id, endpoint, intervals)
//! - [`connection`] - socket lifecycle, liveness, reconnect policy
//! - [`dispatcher`] - single-writer outbound frame queue
//! - [`scheduler`] - batch drain + retry ledger + ack handling
//! - [`sweeper`] - retention-based storage reclamation
//! - [`protocol`] - wire frame types
//! - [`error`] - sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulse_db::{Database, DbConfig};
//! use pulse_sync::{SyncAgent, SyncConfig};
//!
//! let db = Database::new(DbConfig::new("pulse.db")).await?;
//! let config = SyncConfig::load_or_default(None);
//! let agent = SyncAgent::start(config, db).await?;
//!
//! // Hand the sink to sensor collaborators.
//! let sink = agent.sink();
//! sink.submit(record)?;
//!
//! // Observe the engine.
//! let status = agent.status().await?;
//! println!("unsynced: {}", status.total_unsynced());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod sweeper;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{SyncAgent, SyncAgentHandle, SyncStatus, TelemetrySink};
pub use config::SyncConfig;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionState};
pub use dispatcher::DispatcherHandle;
pub use error::{SyncError, SyncResult};
pub use protocol::{FrameMetadata, InboundFrame, OutboundFrame, OutboundKind};
pub use scheduler::{RetryLedger, SchedulerHandle};
pub use sweeper::SweeperHandle;
