//! # Sync Scheduler
//!
//! Reconciles the durable record buffer against server acknowledgments.
//!
//! ## Sync Pass Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Scheduler Flow                               │
//! │                                                                         │
//! │  TRIGGERS                                                              │
//! │  ────────                                                              │
//! │  • periodic timer (30s, only while Connected)                          │
//! │  • sync_now() - initial pass after connect + settle delay, or UI       │
//! │                                                                         │
//! │  PER PASS, PER CATEGORY (independent):                                 │
//! │                                                                         │
//! │  1. Fetch ≤ batch_size unsynced records, oldest-first                  │
//! │                                                                         │
//! │  2. For each record:                                                   │
//! │       validate type tag ──invalid──► skip record, batch continues      │
//! │       build data frame                                                 │
//! │       enqueue via dispatcher ──queue closed──► abort category pass     │
//! │       ledger[record.id] = (category, attempts+1)                       │
//! │       pacing sleep (50ms)                                              │
//! │                                                                         │
//! │  3. On data_ack/audio_ack (any time, unordered):                       │
//! │       remove ledger entry, mark_synced(id) IMMEDIATELY                 │
//! │                                                                         │
//! │  A send that is never acked leaves the record unsynced; the next       │
//! │  pass naturally retries it from the store. No in-pass retry.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use pulse_core::{Category, MessageTypeRegistry};
use pulse_db::RecordStore;

use crate::config::SyncConfig;
use crate::connection::ConnectionHandle;
use crate::dispatcher::DispatcherHandle;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{FrameMetadata, InboundFrame, OutboundFrame};

// =============================================================================
// Retry Ledger
// =============================================================================

/// One in-flight send awaiting acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSend {
    /// Which table the ack should be applied to.
    pub category: Category,
    /// How many times this record has been sent this process lifetime.
    pub attempts: u32,
}

/// Transient map from outbound message id to its pending-send entry.
///
/// Entry present = sent but not yet acknowledged; entry removed = acked.
/// Not persisted; reset on process restart (acks arriving after a restart
/// fall back to a try-each-table mark).
#[derive(Debug, Default)]
pub struct RetryLedger {
    entries: HashMap<String, PendingSend>,
}

impl RetryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a send attempt for a record id.
    pub fn record_send(&mut self, id: &str, category: Category) {
        self.entries
            .entry(id.to_string())
            .and_modify(|p| p.attempts += 1)
            .or_insert(PendingSend {
                category,
                attempts: 1,
            });
    }

    /// Removes and returns the entry for an acknowledged id.
    pub fn acknowledge(&mut self, id: &str) -> Option<PendingSend> {
        self.entries.remove(id)
    }

    /// True if the id has been sent and not yet acknowledged.
    pub fn is_pending(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of sends awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Scheduler Handle
// =============================================================================

/// Handle for triggering and stopping the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    sync_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
    ledger: Arc<Mutex<RetryLedger>>,
}

impl SchedulerHandle {
    /// Requests a sync pass now (in addition to the periodic timer).
    pub async fn sync_now(&self) {
        let _ = self.sync_tx.send(()).await;
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    /// The shared retry ledger (the immediate-send fast path records its
    /// sends here too, so acks route to the right table).
    pub fn ledger(&self) -> Arc<Mutex<RetryLedger>> {
        self.ledger.clone()
    }

    /// Number of sends awaiting acknowledgment.
    pub async fn pending_acks(&self) -> usize {
        self.ledger.lock().await.pending_count()
    }
}

// =============================================================================
// Sync Scheduler
// =============================================================================

/// Drains the record store through the dispatcher and applies acks.
pub struct SyncScheduler {
    store: RecordStore,
    config: Arc<SyncConfig>,
    registry: MessageTypeRegistry,
    dispatcher: DispatcherHandle,
    connection: ConnectionHandle,
    ledger: Arc<Mutex<RetryLedger>>,
    acks_rx: mpsc::UnboundedReceiver<InboundFrame>,
    sync_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SyncScheduler {
    /// Creates a scheduler and its handle.
    ///
    /// `acks_rx` is fed by the Connection Manager with data_ack/audio_ack
    /// frames.
    pub fn new(
        store: RecordStore,
        config: Arc<SyncConfig>,
        dispatcher: DispatcherHandle,
        connection: ConnectionHandle,
        acks_rx: mpsc::UnboundedReceiver<InboundFrame>,
    ) -> (Self, SchedulerHandle) {
        let (sync_tx, sync_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let ledger = Arc::new(Mutex::new(RetryLedger::new()));

        let scheduler = SyncScheduler {
            store,
            config,
            registry: MessageTypeRegistry::new(),
            dispatcher,
            connection,
            ledger: ledger.clone(),
            acks_rx,
            sync_rx,
            shutdown_rx,
        };

        let handle = SchedulerHandle {
            sync_tx,
            shutdown_tx,
            ledger,
        };

        (scheduler, handle)
    }

    /// Scheduler loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.sync.interval_secs,
            batch_size = self.config.sync.batch_size,
            "Sync scheduler starting"
        );

        let mut interval = tokio::time::interval(self.config.sync_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.connection.is_connected() {
                        self.run_pass().await;
                    } else {
                        debug!("Not connected, skipping scheduled sync pass");
                    }
                }

                Some(_) = self.sync_rx.recv() => {
                    if self.connection.is_connected() {
                        self.run_pass().await;
                    } else {
                        debug!("Not connected, ignoring sync_now");
                    }
                }

                ack = self.acks_rx.recv() => {
                    match ack {
                        Some(frame) => self.handle_ack(frame).await,
                        None => {
                            // Connection manager is gone; only shutdown
                            // follows from here.
                            info!("Ack channel closed");
                            break;
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sync scheduler shutting down");
                    break;
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// One full pass over all enabled categories.
    ///
    /// Categories fail independently: an aborted category never blocks the
    /// others.
    async fn run_pass(&self) {
        for category in self.config.sync.categories.clone() {
            if !self.connection.is_connected() {
                debug!("Disconnected mid-pass, deferring remaining categories");
                break;
            }

            match self.sync_category(category).await {
                Ok(0) => {}
                Ok(sent) => debug!(category = %category, sent, "Category batch drained"),
                Err(e) => {
                    // Remaining records retry on the next scheduled pass.
                    error!(category = %category, error = %e, "Category pass aborted");
                }
            }
        }
    }

    /// Drains one batch for one category, oldest-first.
    pub(crate) async fn sync_category(&self, category: Category) -> SyncResult<usize> {
        let batch = self
            .store
            .unsynced(category, self.config.sync.batch_size)
            .await?;

        if batch.is_empty() {
            return Ok(0);
        }

        info!(category = %category, count = batch.len(), "Syncing unsynced batch");

        let mut sent = 0usize;
        for record in &batch {
            // Gate: a record pulled from the store is validated again
            // before it can become a frame (older builds may have written
            // rows this build's registry rejects).
            match OutboundFrame::data(record, &self.registry, self.metadata()) {
                Ok(frame) => {
                    self.dispatcher.enqueue(frame)?;
                    self.ledger.lock().await.record_send(&record.id, category);
                    sent += 1;
                }
                Err(SyncError::InvalidMessageType(tag)) => {
                    // Skip this record; the rest of the batch still flows.
                    // Not deleted, not marked synced.
                    warn!(
                        record_id = %record.id,
                        tag = %tag,
                        "Skipping record with invalid message type"
                    );
                    continue;
                }
                // Local infrastructure error: abort this category's pass.
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.config.pacing()).await;
        }

        Ok(sent)
    }

    /// Applies one server acknowledgment, immediately and individually.
    pub(crate) async fn handle_ack(&self, frame: InboundFrame) {
        let Some(message_id) = frame.ack_message_id().map(str::to_string) else {
            return;
        };

        let entry = self.ledger.lock().await.acknowledge(&message_id);

        let marked = match entry {
            Some(pending) => self
                .store
                .mark_synced(pending.category, std::slice::from_ref(&message_id))
                .await
                .map(|n| n > 0),
            // No ledger entry (e.g. process restarted between send and
            // ack): find the record wherever it lives.
            None => self.store.mark_synced_any(&message_id).await,
        };

        match marked {
            Ok(true) => debug!(message_id = %message_id, "Record marked synced"),
            Ok(false) => debug!(
                message_id = %message_id,
                "Ack for unknown record id, ignoring"
            ),
            Err(e) => error!(
                message_id = %message_id,
                error = %e,
                "Failed to mark record synced"
            ),
        }
    }

    fn metadata(&self) -> FrameMetadata {
        FrameMetadata {
            device_id: self.config.device.id.clone(),
            source: self.config.device.source.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
