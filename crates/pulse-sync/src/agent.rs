//! # Sync Agent
//!
//! Composition root of the sync engine: wires the dispatcher, connection
//! manager, sync scheduler, retention sweeper, and sensor intake together.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  TelemetrySink ──► intake loop ──► RecordStore (always, durable)       │
//! │                        │                                                │
//! │                        └──if Connected──► Dispatcher (fast path)        │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Connection    │  │ SyncScheduler  │  │  RetentionSweeper      │    │
//! │  │  (socket owner)│  │                │  │                        │    │
//! │  │                │  │ periodic +     │  │ purges synced records  │    │
//! │  │ liveness,      │  │ on-demand      │  │ past the horizon       │    │
//! │  │ heartbeat,     │  │ batch drain,   │  │                        │    │
//! │  │ reconnect      │  │ ack handling   │  │                        │    │
//! │  └───────┬────────┘  └───────▲────────┘  └────────────────────────┘    │
//! │          │ Connected event   │ sync_now after settle delay             │
//! │          ▼                   │                                          │
//! │  ┌──────────────────────────┴───┐                                      │
//! │  │        event router          │                                      │
//! │  └──────────────────────────────┘                                      │
//! │                                                                         │
//! │  Everything is explicitly constructed and injected here - no global    │
//! │  store or socket handles anywhere in the engine.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_core::{Category, MessageTypeRegistry, Record};
use pulse_db::{Database, RecordStore};

use crate::config::SyncConfig;
use crate::connection::{Connection, ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionState};
use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{FrameMetadata, OutboundFrame};
use crate::scheduler::{RetryLedger, SchedulerHandle, SyncScheduler};
use crate::sweeper::{RetentionSweeper, SweeperHandle};

// =============================================================================
// Sync Status
// =============================================================================

/// Aggregate status snapshot, the only user-visible signal the engine
/// produces.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Current connection state.
    pub connection_state: ConnectionState,

    /// Whether currently connected to the ingestion service.
    pub is_connected: bool,

    /// Unsynced record counts per category.
    pub unsynced: Vec<(Category, i64)>,

    /// Sends awaiting acknowledgment this process lifetime.
    pub pending_acks: usize,
}

impl SyncStatus {
    /// Total unsynced records across all categories.
    pub fn total_unsynced(&self) -> i64 {
        self.unsynced.iter().map(|(_, n)| n).sum()
    }
}

// =============================================================================
// Telemetry Sink
// =============================================================================

/// Cloneable intake handle handed to sensor collaborators.
///
/// Replaces callback-style sensor hooks with an explicit channel: sensors
/// fire-and-forget readings into the durable store without ever touching
/// socket code.
#[derive(Clone)]
pub struct TelemetrySink {
    tx: mpsc::UnboundedSender<Record>,
}

impl TelemetrySink {
    /// Submits one reading.
    ///
    /// The record is durably buffered regardless of connectivity; if a
    /// socket is live it is additionally sent immediately (best-effort,
    /// bypassing the batch scheduler).
    pub fn submit(&self, record: Record) -> SyncResult<()> {
        self.tx
            .send(record)
            .map_err(|_| SyncError::ShuttingDown)
    }
}

// =============================================================================
// Sync Agent
// =============================================================================

/// The assembled sync engine.
pub struct SyncAgent;

impl SyncAgent {
    /// Validates the config, spawns every component, and returns the
    /// control handle.
    pub async fn start(config: SyncConfig, db: Database) -> SyncResult<SyncAgentHandle> {
        config.validate()?;
        let config = Arc::new(config);
        let store = db.records();
        let url = config.realtime_url()?;

        info!(
            device_id = %config.device.id,
            url = %url,
            "Starting sync agent"
        );

        // Outbound dispatcher: the single socket writer.
        let dispatcher = Dispatcher::spawn();

        // Connection manager.
        let (events_tx, events_rx) = mpsc::channel(16);
        let (acks_tx, acks_rx) = mpsc::unbounded_channel();
        let connection_config = ConnectionConfig {
            url,
            device_id: config.device.id.clone(),
            source: config.device.source.clone(),
            connect_timeout: config.connect_timeout(),
            initial_backoff: std::time::Duration::from_millis(
                config.reconnect.initial_backoff_ms,
            ),
            max_backoff: std::time::Duration::from_secs(config.reconnect.max_backoff_secs),
            established_retry: std::time::Duration::from_secs(
                config.reconnect.established_interval_secs,
            ),
            liveness_check_interval: std::time::Duration::from_secs(
                config.liveness.check_interval_secs,
            ),
            liveness_timeout: std::time::Duration::from_secs(config.liveness.timeout_secs),
            heartbeat_interval: std::time::Duration::from_secs(
                config.liveness.heartbeat_interval_secs,
            ),
        };
        let connection = Connection::spawn(
            connection_config,
            dispatcher.clone(),
            events_tx,
            acks_tx,
        );

        // Sync scheduler.
        let (scheduler, scheduler_handle) = SyncScheduler::new(
            store.clone(),
            config.clone(),
            dispatcher.clone(),
            connection.clone(),
            acks_rx,
        );
        tokio::spawn(scheduler.run());

        // Retention sweeper.
        let (sweeper, sweeper_handle) = RetentionSweeper::new(store.clone(), config.clone());
        tokio::spawn(sweeper.run());

        // Sensor intake.
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::intake_loop(
            store.clone(),
            config.clone(),
            dispatcher.clone(),
            connection.clone(),
            scheduler_handle.ledger(),
            sink_rx,
        ));

        // Event router: connect → settle delay → initial sync pass.
        tokio::spawn(Self::event_router(
            config.clone(),
            events_rx,
            scheduler_handle.clone(),
        ));

        Ok(SyncAgentHandle {
            store,
            connection,
            scheduler: scheduler_handle,
            sweeper: sweeper_handle,
            dispatcher,
            sink_tx,
        })
    }

    /// Routes connection events.
    ///
    /// Every successful connect schedules one initial sync pass after the
    /// settle delay, so a client reconnecting after a long offline period
    /// empties its backlog promptly.
    async fn event_router(
        config: Arc<SyncConfig>,
        mut events_rx: mpsc::Receiver<ConnectionEvent>,
        scheduler: SchedulerHandle,
    ) {
        while let Some(event) = events_rx.recv().await {
            match event {
                ConnectionEvent::Connected => {
                    info!("Connected to ingestion service");
                    let scheduler = scheduler.clone();
                    let settle = config.settle_delay();
                    tokio::spawn(async move {
                        tokio::time::sleep(settle).await;
                        scheduler.sync_now().await;
                    });
                }
                ConnectionEvent::Disconnected => {
                    debug!("Disconnected from ingestion service");
                }
            }
        }
        debug!("Event router stopped");
    }

    /// Drains the sensor intake channel.
    ///
    /// Every reading is durably buffered first; the immediate send is
    /// best-effort sugar on top - if it never arrives, the scheduler
    /// resends from the store.
    async fn intake_loop(
        store: RecordStore,
        config: Arc<SyncConfig>,
        dispatcher: DispatcherHandle,
        connection: ConnectionHandle,
        ledger: Arc<tokio::sync::Mutex<RetryLedger>>,
        mut sink_rx: mpsc::UnboundedReceiver<Record>,
    ) {
        let registry = MessageTypeRegistry::new();

        while let Some(record) = sink_rx.recv().await {
            if let Err(e) = store.append(&record).await {
                // Invalid tag or store failure; either way the reading is
                // refused, not silently half-accepted.
                warn!(record_id = %record.id, error = %e, "Failed to buffer record");
                continue;
            }

            if connection.is_connected() {
                let metadata = FrameMetadata {
                    device_id: config.device.id.clone(),
                    source: config.device.source.clone(),
                };
                match OutboundFrame::data(&record, &registry, metadata) {
                    Ok(frame) => {
                        ledger
                            .lock()
                            .await
                            .record_send(&record.id, record.category());
                        if dispatcher.enqueue(frame).is_err() {
                            break;
                        }
                        debug!(record_id = %record.id, "Record sent via fast path");
                    }
                    Err(e) => {
                        // The store accepted it, so this should not happen;
                        // the scheduler will pick it up regardless.
                        debug!(record_id = %record.id, error = %e, "Fast path skipped");
                    }
                }
            }
        }

        debug!("Sensor intake stopped");
    }
}

// =============================================================================
// Agent Handle
// =============================================================================

/// Handle for controlling a running sync engine.
pub struct SyncAgentHandle {
    store: RecordStore,
    connection: ConnectionHandle,
    scheduler: SchedulerHandle,
    sweeper: SweeperHandle,
    dispatcher: DispatcherHandle,
    sink_tx: mpsc::UnboundedSender<Record>,
}

impl SyncAgentHandle {
    /// An intake handle for sensor collaborators.
    pub fn sink(&self) -> TelemetrySink {
        TelemetrySink {
            tx: self.sink_tx.clone(),
        }
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// A watch receiver for connection state transitions.
    pub fn watch_connection(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.connection.watch()
    }

    /// Aggregate status snapshot (connection + unsynced counts).
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let state = self.connection.state();
        let unsynced = self.store.unsynced_counts().await?;
        Ok(SyncStatus {
            connection_state: state,
            is_connected: state == ConnectionState::Connected,
            unsynced,
            pending_acks: self.scheduler.pending_acks().await,
        })
    }

    /// Requests a sync pass now.
    pub async fn sync_now(&self) {
        self.scheduler.sync_now().await;
    }

    /// Preempts any pending reconnect wait and connects now.
    pub async fn connect_now(&self) {
        self.connection.connect_now().await;
    }

    /// Stops every engine task and closes the frame queue.
    ///
    /// The record store is left untouched: whatever is still unsynced
    /// stays buffered for the next process lifetime.
    pub async fn shutdown(&self) {
        info!("Shutting down sync agent");
        self.scheduler.shutdown().await;
        self.sweeper.shutdown().await;
        self.connection.shutdown().await;
        self.dispatcher.shutdown().await;
        info!("Sync agent stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::RecordPayload;
    use pulse_db::DbConfig;
    use std::time::Duration;

    fn test_config() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.device.id = "dev-agent-test".into();
        // Unroutable: connection attempts fail fast and back off.
        config.ingest.base_url = "http://127.0.0.1:1".into();
        config.sync.pacing_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_records_buffer_while_disconnected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let handle = SyncAgent::start(test_config(), db.clone()).await.unwrap();
        let sink = handle.sink();

        for i in 0..3 {
            sink.submit(Record::new(
                "dev-agent-test",
                RecordPayload::HeartRate {
                    bpm: 60.0 + i as f64,
                    confidence: 0.9,
                },
            ))
            .unwrap();
        }

        // The intake loop is async; poll until the records land.
        let store = db.records();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let count = store.unsynced_count(Category::HeartRate).await.unwrap();
            if count == 3 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "records never landed in the store"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let status = handle.status().await.unwrap();
        assert!(!status.is_connected);
        assert_eq!(status.total_unsynced(), 3);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_rejects_unconfigured_device() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = SyncConfig::default(); // no device id
        assert!(matches!(
            SyncAgent::start(config, db).await,
            Err(SyncError::MissingDeviceId)
        ));
    }
}
