//! # Retention Sweeper
//!
//! Reclaims storage for records the server has confirmed receiving.
//!
//! Deletes `synced = true` records whose `created_at` is past the
//! retention horizon (default 7 days). Unsynced records are never touched,
//! regardless of age - undelivered data outlives any horizon.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use pulse_db::RecordStore;

use crate::config::SyncConfig;

// =============================================================================
// Sweeper Handle
// =============================================================================

/// Handle for stopping the sweeper.
#[derive(Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Retention Sweeper
// =============================================================================

/// Periodic storage-reclamation task.
pub struct RetentionSweeper {
    store: RecordStore,
    config: Arc<SyncConfig>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl RetentionSweeper {
    /// Creates a sweeper and its handle.
    pub fn new(store: RecordStore, config: Arc<SyncConfig>) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sweeper = RetentionSweeper {
            store,
            config,
            shutdown_rx,
        };
        let handle = SweeperHandle { shutdown_tx };

        (sweeper, handle)
    }

    /// Sweeper loop. Spawn as a background task.
    pub async fn run(mut self) {
        info!(
            horizon_days = self.config.retention.horizon_days,
            interval_secs = self.config.retention.sweep_interval_secs,
            "Retention sweeper starting"
        );

        // First sweep shortly after startup, then on the long cadence.
        let initial_delay = Duration::from_secs(self.config.retention.initial_delay_secs);
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {}
            _ = self.shutdown_rx.recv() => {
                info!("Retention sweeper stopped before first sweep");
                return;
            }
        }

        let interval = Duration::from_secs(self.config.retention.sweep_interval_secs);
        loop {
            self.sweep().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown_rx.recv() => break,
            }
        }

        info!("Retention sweeper stopped");
    }

    /// One sweep over every category.
    ///
    /// Failures are logged and skipped; a category that can't be swept now
    /// gets another chance on the next cadence.
    pub(crate) async fn sweep(&self) {
        let cutoff = chrono::Utc::now() - self.config.retention_horizon();
        debug!(%cutoff, "Running retention sweep");

        let mut total = 0u64;
        for category in pulse_core::Category::ALL {
            match self.store.purge_older_than(category, cutoff).await {
                Ok(deleted) => total += deleted,
                Err(e) => {
                    error!(category = %category, error = %e, "Retention sweep failed");
                }
            }
        }

        if total > 0 {
            info!(deleted = total, "Retention sweep reclaimed records");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use pulse_core::{Category, Record, RecordPayload};
    use pulse_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_sweep_reclaims_only_synced_past_horizon() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = db.records();

        let mut config = SyncConfig::default();
        config.device.id = "dev-test".into();
        config.retention.horizon_days = 7;

        let old = Utc::now() - ChronoDuration::days(10);

        let mut acked_old = Record::new(
            "dev-test",
            RecordPayload::HeartRate {
                bpm: 61.0,
                confidence: 0.9,
            },
        );
        acked_old.created_at = old;

        let mut unacked_old = Record::new(
            "dev-test",
            RecordPayload::HeartRate {
                bpm: 62.0,
                confidence: 0.9,
            },
        );
        unacked_old.created_at = old;

        let acked_fresh = Record::new(
            "dev-test",
            RecordPayload::HeartRate {
                bpm: 63.0,
                confidence: 0.9,
            },
        );

        store
            .append_batch(&[acked_old.clone(), unacked_old.clone(), acked_fresh.clone()])
            .await
            .unwrap();
        store
            .mark_synced(
                Category::HeartRate,
                &[acked_old.id.clone(), acked_fresh.id.clone()],
            )
            .await
            .unwrap();

        let (sweeper, _handle) = RetentionSweeper::new(store.clone(), Arc::new(config));
        sweeper.sweep().await;

        // Only the synced-and-old record is gone.
        assert!(store
            .synced_flag(Category::HeartRate, &acked_old.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.synced_flag(Category::HeartRate, &unacked_old.id).await.unwrap(),
            Some(false)
        );
        assert_eq!(
            store.synced_flag(Category::HeartRate, &acked_fresh.id).await.unwrap(),
            Some(true)
        );
    }
}
