//! # Record Store Repository
//!
//! Durable per-category buffer of pending/sent telemetry records.
//!
//! ## The Store-and-Forward Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Record Store Operations                              │
//! │                                                                         │
//! │  append / append_batch                                                 │
//! │    INSERT OR REPLACE - idempotent on duplicate id (last write wins),   │
//! │    synced = 0. A record that predates a crash survives it (WAL).       │
//! │                                                                         │
//! │  unsynced(category, limit)                                             │
//! │    SELECT ... WHERE synced = 0 ORDER BY created_at ASC LIMIT ?         │
//! │    Oldest-first: bounds staleness, and a flood of new readings can     │
//! │    never starve old ones.                                              │
//! │                                                                         │
//! │  mark_synced(category, ids)                                            │
//! │    Single UPDATE over the id set. Unknown ids are a no-op - the        │
//! │    server may ack records the sweeper already pruned.                  │
//! │                                                                         │
//! │  purge_older_than(category, cutoff)                                    │
//! │    DELETE WHERE synced = 1 AND created_at < cutoff.                    │
//! │    An unsynced record is NEVER purged, regardless of age.              │
//! │                                                                         │
//! │  All operations are safe under concurrent callers: sensor writers      │
//! │  and the sync scheduler share the pool.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row as _, SqlitePool};
use tracing::debug;

use pulse_core::{Category, MessageTypeRegistry, Record, RecordPayload};

use crate::error::{DbError, DbResult};

// =============================================================================
// Row Types
// =============================================================================

#[derive(FromRow)]
struct HeartRateRow {
    id: String,
    device_id: String,
    recorded_at: DateTime<Utc>,
    bpm: f64,
    confidence: f64,
    synced: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct GpsRow {
    id: String,
    device_id: String,
    recorded_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    altitude: f64,
    accuracy: f64,
    heading: f64,
    speed: f64,
    synced: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SleepStateRow {
    id: String,
    device_id: String,
    recorded_at: DateTime<Utc>,
    state: String,
    confidence: f64,
    duration_secs: i64,
    synced: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct PowerEventRow {
    id: String,
    device_id: String,
    recorded_at: DateTime<Utc>,
    battery_level: f64,
    charging: bool,
    event_type: String,
    synced: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct GenericRow {
    id: String,
    device_id: String,
    recorded_at: DateTime<Utc>,
    message_type_id: String,
    payload: String,
    synced: bool,
    created_at: DateTime<Utc>,
}

// =============================================================================
// Record Store
// =============================================================================

/// Repository over the five per-category record tables.
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
    registry: MessageTypeRegistry,
}

impl RecordStore {
    /// Creates a new RecordStore.
    pub fn new(pool: SqlitePool) -> Self {
        RecordStore {
            pool,
            registry: MessageTypeRegistry::new(),
        }
    }

    // =========================================================================
    // Append
    // =========================================================================

    /// Durably persists one record with `synced = false`.
    ///
    /// Idempotent on duplicate id (`INSERT OR REPLACE`, last write wins).
    /// Generic records with an unregistered type tag are rejected before
    /// the row is written.
    pub async fn append(&self, record: &Record) -> DbResult<()> {
        self.gate_generic(record)?;
        self.insert(&self.pool, record).await?;

        debug!(
            id = %record.id,
            category = %record.category(),
            "Record appended"
        );
        Ok(())
    }

    /// Bulk [`RecordStore::append`] in a single transaction.
    pub async fn append_batch(&self, records: &[Record]) -> DbResult<()> {
        for record in records {
            self.gate_generic(record)?;
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            self.insert(&mut *tx, record).await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "Record batch appended");
        Ok(())
    }

    fn gate_generic(&self, record: &Record) -> DbResult<()> {
        if let RecordPayload::Other {
            message_type_id, ..
        } = &record.payload
        {
            if !self.registry.is_valid(message_type_id) {
                return Err(DbError::InvalidMessageType {
                    record_id: record.id.clone(),
                    type_id: message_type_id.clone(),
                });
            }
        }
        Ok(())
    }

    async fn insert<'e, E>(&self, executor: E, record: &Record) -> DbResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        match &record.payload {
            RecordPayload::HeartRate { bpm, confidence } => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO heart_rate_records
                        (id, device_id, recorded_at, bpm, confidence, timestamp, synced, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?3, ?6, ?7)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.device_id)
                .bind(record.recorded_at)
                .bind(bpm)
                .bind(confidence)
                .bind(record.synced)
                .bind(record.created_at)
                .execute(executor)
                .await?;
            }
            RecordPayload::Gps {
                latitude,
                longitude,
                altitude,
                accuracy,
                heading,
                speed,
            } => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO gps_records
                        (id, device_id, recorded_at, latitude, longitude, altitude,
                         accuracy, heading, speed, timestamp, synced, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?3, ?10, ?11)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.device_id)
                .bind(record.recorded_at)
                .bind(latitude)
                .bind(longitude)
                .bind(altitude)
                .bind(accuracy)
                .bind(heading)
                .bind(speed)
                .bind(record.synced)
                .bind(record.created_at)
                .execute(executor)
                .await?;
            }
            RecordPayload::SleepState {
                state,
                confidence,
                duration_secs,
            } => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO sleep_state_records
                        (id, device_id, recorded_at, state, confidence, duration_secs,
                         timestamp, synced, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?3, ?7, ?8)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.device_id)
                .bind(record.recorded_at)
                .bind(state)
                .bind(confidence)
                .bind(duration_secs)
                .bind(record.synced)
                .bind(record.created_at)
                .execute(executor)
                .await?;
            }
            RecordPayload::PowerEvent {
                battery_level,
                charging,
                event_type,
            } => {
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO power_event_records
                        (id, device_id, recorded_at, battery_level, charging, event_type,
                         timestamp, synced, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?3, ?7, ?8)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.device_id)
                .bind(record.recorded_at)
                .bind(battery_level)
                .bind(charging)
                .bind(event_type)
                .bind(record.synced)
                .bind(record.created_at)
                .execute(executor)
                .await?;
            }
            RecordPayload::Other {
                message_type_id,
                data,
            } => {
                let payload = serde_json::to_string(data)?;
                sqlx::query(
                    r#"
                    INSERT OR REPLACE INTO generic_records
                        (id, device_id, recorded_at, message_type_id, payload,
                         timestamp, synced, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?3, ?6, ?7)
                    "#,
                )
                .bind(&record.id)
                .bind(&record.device_id)
                .bind(record.recorded_at)
                .bind(message_type_id)
                .bind(payload)
                .bind(record.synced)
                .bind(record.created_at)
                .execute(executor)
                .await?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Unsynced Queue
    // =========================================================================

    /// Returns up to `limit` unsynced records, oldest-first by `created_at`.
    pub async fn unsynced(&self, category: Category, limit: u32) -> DbResult<Vec<Record>> {
        let records = match category {
            Category::HeartRate => {
                let rows: Vec<HeartRateRow> = sqlx::query_as(
                    r#"
                    SELECT id, device_id, recorded_at, bpm, confidence, synced, created_at
                    FROM heart_rate_records
                    WHERE synced = 0
                    ORDER BY created_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(Record::from).collect()
            }
            Category::Gps => {
                let rows: Vec<GpsRow> = sqlx::query_as(
                    r#"
                    SELECT id, device_id, recorded_at, latitude, longitude, altitude,
                           accuracy, heading, speed, synced, created_at
                    FROM gps_records
                    WHERE synced = 0
                    ORDER BY created_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(Record::from).collect()
            }
            Category::SleepState => {
                let rows: Vec<SleepStateRow> = sqlx::query_as(
                    r#"
                    SELECT id, device_id, recorded_at, state, confidence, duration_secs,
                           synced, created_at
                    FROM sleep_state_records
                    WHERE synced = 0
                    ORDER BY created_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(Record::from).collect()
            }
            Category::PowerEvent => {
                let rows: Vec<PowerEventRow> = sqlx::query_as(
                    r#"
                    SELECT id, device_id, recorded_at, battery_level, charging, event_type,
                           synced, created_at
                    FROM power_event_records
                    WHERE synced = 0
                    ORDER BY created_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(Record::from).collect()
            }
            Category::Generic => {
                let rows: Vec<GenericRow> = sqlx::query_as(
                    r#"
                    SELECT id, device_id, recorded_at, message_type_id, payload,
                           synced, created_at
                    FROM generic_records
                    WHERE synced = 0
                    ORDER BY created_at ASC
                    LIMIT ?1
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter()
                    .map(Record::try_from)
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(records)
    }

    /// Counts unsynced records in one category.
    pub async fn unsynced_count(&self, category: Category) -> DbResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE synced = 0",
            category.table()
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Unsynced counts across all categories (status surface).
    pub async fn unsynced_counts(&self) -> DbResult<Vec<(Category, i64)>> {
        let mut counts = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            counts.push((category, self.unsynced_count(category).await?));
        }
        Ok(counts)
    }

    // =========================================================================
    // Synced Flag
    // =========================================================================

    /// Atomically flips `synced` to true for the given ids.
    ///
    /// Unknown ids are a no-op. Returns the number of rows actually
    /// flipped.
    pub async fn mark_synced(&self, category: Category, ids: &[String]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE {} SET synced = 1 WHERE id IN ({})",
            category.table(),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Marks one id as synced wherever it lives.
    ///
    /// Used when an ack arrives without a retry-ledger entry (e.g. the
    /// process restarted between send and ack). Returns true if any table
    /// held the id; false means the record was already pruned or never
    /// existed, which is fine.
    pub async fn mark_synced_any(&self, id: &str) -> DbResult<bool> {
        for category in Category::ALL {
            if self.mark_synced(category, &[id.to_string()]).await? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Retention
    // =========================================================================

    /// Deletes records with `synced = true` and `created_at` before the
    /// cutoff. Returns the number of deleted rows.
    pub async fn purge_older_than(
        &self,
        category: Category,
        cutoff: DateTime<Utc>,
    ) -> DbResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE synced = 1 AND created_at < ?1",
            category.table()
        );

        let result = sqlx::query(&sql).bind(cutoff).execute(&self.pool).await?;
        let deleted = result.rows_affected();

        if deleted > 0 {
            debug!(category = %category, deleted, "Purged synced records");
        }
        Ok(deleted)
    }

    /// Looks up a single record by id within a category (diagnostics).
    pub async fn synced_flag(&self, category: Category, id: &str) -> DbResult<Option<bool>> {
        let sql = format!("SELECT synced FROM {} WHERE id = ?1", category.table());
        let row: Option<SqliteRow> = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<bool, _>("synced")))
    }
}

// =============================================================================
// Row → Record Conversions
// =============================================================================

impl From<HeartRateRow> for Record {
    fn from(row: HeartRateRow) -> Self {
        Record {
            id: row.id,
            device_id: row.device_id,
            recorded_at: row.recorded_at,
            payload: RecordPayload::HeartRate {
                bpm: row.bpm,
                confidence: row.confidence,
            },
            synced: row.synced,
            created_at: row.created_at,
        }
    }
}

impl From<GpsRow> for Record {
    fn from(row: GpsRow) -> Self {
        Record {
            id: row.id,
            device_id: row.device_id,
            recorded_at: row.recorded_at,
            payload: RecordPayload::Gps {
                latitude: row.latitude,
                longitude: row.longitude,
                altitude: row.altitude,
                accuracy: row.accuracy,
                heading: row.heading,
                speed: row.speed,
            },
            synced: row.synced,
            created_at: row.created_at,
        }
    }
}

impl From<SleepStateRow> for Record {
    fn from(row: SleepStateRow) -> Self {
        Record {
            id: row.id,
            device_id: row.device_id,
            recorded_at: row.recorded_at,
            payload: RecordPayload::SleepState {
                state: row.state,
                confidence: row.confidence,
                duration_secs: row.duration_secs,
            },
            synced: row.synced,
            created_at: row.created_at,
        }
    }
}

impl From<PowerEventRow> for Record {
    fn from(row: PowerEventRow) -> Self {
        Record {
            id: row.id,
            device_id: row.device_id,
            recorded_at: row.recorded_at,
            payload: RecordPayload::PowerEvent {
                battery_level: row.battery_level,
                charging: row.charging,
                event_type: row.event_type,
            },
            synced: row.synced,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<GenericRow> for Record {
    type Error = DbError;

    fn try_from(row: GenericRow) -> Result<Self, Self::Error> {
        let data = serde_json::from_str(&row.payload)?;
        Ok(Record {
            id: row.id,
            device_id: row.device_id,
            recorded_at: row.recorded_at,
            payload: RecordPayload::Other {
                message_type_id: row.message_type_id,
                data,
            },
            synced: row.synced,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use serde_json::json;

    async fn store() -> RecordStore {
        Database::new(DbConfig::in_memory()).await.unwrap().records()
    }

    fn heart_rate(device: &str, bpm: f64) -> Record {
        Record::new(
            device,
            RecordPayload::HeartRate {
                bpm,
                confidence: 0.95,
            },
        )
    }

    fn gps(device: &str, lat: f64, lon: f64) -> Record {
        Record::new(
            device,
            RecordPayload::Gps {
                latitude: lat,
                longitude: lon,
                altitude: 30.0,
                accuracy: 4.5,
                heading: 180.0,
                speed: 1.4,
            },
        )
    }

    #[tokio::test]
    async fn test_append_and_fetch_unsynced() {
        let store = store().await;

        let record = gps("dev-1", 37.0, -122.0);
        store.append(&record).await.unwrap();

        assert_eq!(store.unsynced_count(Category::Gps).await.unwrap(), 1);

        let pending = store.unsynced(Category::Gps, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);
        assert_eq!(pending[0].device_id, record.device_id);
        assert_eq!(pending[0].payload, record.payload);
        assert!(!pending[0].synced);
    }

    #[tokio::test]
    async fn test_duplicate_id_collapses_to_one_record() {
        let store = store().await;

        let mut record = heart_rate("dev-1", 60.0);
        store.append(&record).await.unwrap();

        // Same id, different reading: last write wins.
        record.payload = RecordPayload::HeartRate {
            bpm: 75.0,
            confidence: 0.9,
        };
        store.append(&record).await.unwrap();

        let pending = store.unsynced(Category::HeartRate, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].payload,
            RecordPayload::HeartRate {
                bpm: 75.0,
                confidence: 0.9
            }
        );

        // One ack marks the single logical record exactly once.
        let flipped = store
            .mark_synced(Category::HeartRate, &[record.id.clone()])
            .await
            .unwrap();
        assert_eq!(flipped, 1);
        assert_eq!(store.unsynced_count(Category::HeartRate).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsynced_is_oldest_first() {
        let store = store().await;
        let base = Utc::now();

        // Insert newest-first to prove ordering comes from created_at,
        // not insertion order.
        for offset in [3, 1, 2] {
            let mut record = heart_rate("dev-1", 60.0 + offset as f64);
            record.created_at = base + Duration::seconds(offset);
            store.append(&record).await.unwrap();
        }

        let pending = store.unsynced(Category::HeartRate, 10).await.unwrap();
        let created: Vec<_> = pending.iter().map(|r| r.created_at).collect();
        let mut sorted = created.clone();
        sorted.sort();
        assert_eq!(created, sorted);
    }

    #[tokio::test]
    async fn test_batch_limit_pagination() {
        let store = store().await;
        let base = Utc::now();

        let mut records = Vec::new();
        for i in 0..120 {
            let mut record = heart_rate("dev-1", 60.0);
            record.created_at = base + Duration::milliseconds(i);
            records.push(record);
        }
        store.append_batch(&records).await.unwrap();

        // First pass: exactly 50, oldest-first.
        let first = store.unsynced(Category::HeartRate, 50).await.unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first[0].id, records[0].id);
        let ids: Vec<_> = first.iter().map(|r| r.id.clone()).collect();
        store.mark_synced(Category::HeartRate, &ids).await.unwrap();

        // Second pass: the next 50.
        let second = store.unsynced(Category::HeartRate, 50).await.unwrap();
        assert_eq!(second.len(), 50);
        assert_eq!(second[0].id, records[50].id);
        let ids: Vec<_> = second.iter().map(|r| r.id.clone()).collect();
        store.mark_synced(Category::HeartRate, &ids).await.unwrap();

        // Third pass: the remaining 20.
        let third = store.unsynced(Category::HeartRate, 50).await.unwrap();
        assert_eq!(third.len(), 20);
    }

    #[tokio::test]
    async fn test_mark_synced_is_idempotent_and_tolerant() {
        let store = store().await;

        let record = gps("dev-1", 37.0, -122.0);
        store.append(&record).await.unwrap();

        let first = store
            .mark_synced(Category::Gps, &[record.id.clone()])
            .await
            .unwrap();
        assert_eq!(first, 1);

        // Second call: already synced rows still match the WHERE clause,
        // but store state is unchanged beyond the first effective call.
        store
            .mark_synced(Category::Gps, &[record.id.clone()])
            .await
            .unwrap();
        assert_eq!(store.unsynced_count(Category::Gps).await.unwrap(), 0);

        // Unknown id: no error, no effect.
        let unknown = store
            .mark_synced(Category::Gps, &["no-such-id".to_string()])
            .await
            .unwrap();
        assert_eq!(unknown, 0);
    }

    #[tokio::test]
    async fn test_mark_synced_any_finds_the_right_table() {
        let store = store().await;

        let record = Record::new(
            "dev-1",
            RecordPayload::SleepState {
                state: "deep".into(),
                confidence: 0.7,
                duration_secs: 3600,
            },
        );
        store.append(&record).await.unwrap();

        assert!(store.mark_synced_any(&record.id).await.unwrap());
        assert_eq!(
            store.synced_flag(Category::SleepState, &record.id).await.unwrap(),
            Some(true)
        );

        assert!(!store.mark_synced_any("pruned-long-ago").await.unwrap());
    }

    #[tokio::test]
    async fn test_retention_never_touches_unsynced() {
        let store = store().await;
        let old = Utc::now() - Duration::days(30);

        let mut synced_old = heart_rate("dev-1", 58.0);
        synced_old.created_at = old;
        let mut unsynced_old = heart_rate("dev-1", 59.0);
        unsynced_old.created_at = old;
        let fresh = heart_rate("dev-1", 61.0);

        store
            .append_batch(&[synced_old.clone(), unsynced_old.clone(), fresh.clone()])
            .await
            .unwrap();
        store
            .mark_synced(Category::HeartRate, &[synced_old.id.clone()])
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::days(7);
        let deleted = store
            .purge_older_than(Category::HeartRate, cutoff)
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        // The ancient-but-unsynced record survives; so does the fresh one.
        let remaining = store.unsynced(Category::HeartRate, 10).await.unwrap();
        let ids: Vec<_> = remaining.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&unsynced_old.id.as_str()));
        assert!(ids.contains(&fresh.id.as_str()));
        assert!(store
            .synced_flag(Category::HeartRate, &synced_old.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_generic_round_trip_and_gate() {
        let store = store().await;

        let record = Record::new(
            "dev-1",
            RecordPayload::Other {
                message_type_id: "screen_text".into(),
                data: json!({"text": "terminal", "app": "iterm"}),
            },
        );
        store.append(&record).await.unwrap();

        let pending = store.unsynced(Category::Generic, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload, record.payload);

        // Unregistered tag is rejected before the row is written.
        let bad = Record::new(
            "dev-1",
            RecordPayload::Other {
                message_type_id: "".into(),
                data: json!({}),
            },
        );
        assert!(matches!(
            store.append(&bad).await,
            Err(DbError::InvalidMessageType { .. })
        ));
        assert_eq!(store.unsynced_count(Category::Generic).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsynced_counts_snapshot() {
        let store = store().await;

        store.append(&heart_rate("dev-1", 62.0)).await.unwrap();
        store.append(&gps("dev-1", 37.0, -122.0)).await.unwrap();
        store.append(&gps("dev-1", 37.1, -122.1)).await.unwrap();

        let counts: std::collections::HashMap<_, _> =
            store.unsynced_counts().await.unwrap().into_iter().collect();
        assert_eq!(counts[&Category::HeartRate], 1);
        assert_eq!(counts[&Category::Gps], 2);
        assert_eq!(counts[&Category::Generic], 0);
    }
}
