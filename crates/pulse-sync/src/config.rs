//! # Sync Configuration
//!
//! Configuration for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PULSE_DEVICE_ID=abc-123                                            │
//! │     PULSE_BASE_URL=https://ingest.example.com                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/pulse/sync.toml (Linux)                                  │
//! │     ~/Library/Application Support/io.pulse.telemetry/sync.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"  # assigned at registration
//! source = "mobile"
//!
//! [ingest]
//! base_url = "https://ingest.example.com"
//!
//! [sync]
//! categories = ["heart_rate", "gps", "sleep_state", "power_event", "generic"]
//! batch_size = 50
//! pacing_ms = 50
//! interval_secs = 30
//!
//! [retention]
//! horizon_days = 7
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use pulse_core::Category;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Settings
// =============================================================================

/// Identity of this device.
///
/// The id is obtained once by the out-of-band registration HTTP call; the
/// sync engine only re-announces it via the `device_register` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Stable device identifier.
    pub id: String,

    /// Producer tag carried in every frame's metadata.
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "mobile".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            id: String::new(),
            source: default_source(),
        }
    }
}

// =============================================================================
// Ingest Settings
// =============================================================================

/// The ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Base HTTP(S) endpoint. Rewritten to WS(S) for the realtime socket.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Batch drain behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Categories enabled for sync, in pass order.
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,

    /// Unsynced records fetched per category per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Delay between records within a batch (milliseconds). Throttles
    /// burst load on the single socket write loop.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Interval between scheduled sync passes (seconds). Passes are
    /// skipped while disconnected.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Delay between a successful connect and the initial sync pass
    /// (milliseconds). Avoids hammering the socket before the handshake
    /// settles.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

fn default_batch_size() -> u32 {
    50
}

fn default_pacing_ms() -> u64 {
    50
}

fn default_sync_interval() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            categories: default_categories(),
            batch_size: default_batch_size(),
            pacing_ms: default_pacing_ms(),
            interval_secs: default_sync_interval(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

// =============================================================================
// Liveness Settings
// =============================================================================

/// Liveness monitoring and heartbeat emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessSettings {
    /// How often the liveness check runs (seconds).
    #[serde(default = "default_liveness_check")]
    pub check_interval_secs: u64,

    /// The connection is declared dead when no server ping/pong has been
    /// seen within this window (seconds).
    #[serde(default = "default_liveness_timeout")]
    pub timeout_secs: u64,

    /// Client heartbeat emission interval (seconds). Purely for
    /// server-side presence; its ack does not gate liveness.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
}

fn default_liveness_check() -> u64 {
    5
}

fn default_liveness_timeout() -> u64 {
    15
}

fn default_heartbeat_interval() -> u64 {
    1
}

impl Default for LivenessSettings {
    fn default() -> Self {
        LivenessSettings {
            check_interval_secs: default_liveness_check(),
            timeout_secs: default_liveness_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

// =============================================================================
// Reconnect Settings
// =============================================================================

/// Reconnection backoff policy.
///
/// Two tiers: exponential (bounded) while a connection has never
/// succeeded, and a longer fixed interval once an established connection
/// is lost - loss after success is usually a longer-lived outage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Initial backoff (milliseconds) before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap (seconds) while never having connected successfully.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Fixed retry interval (seconds) after losing an established
    /// connection.
    #[serde(default = "default_established_interval")]
    pub established_interval_secs: u64,
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60
}

fn default_established_interval() -> u64 {
    900 // 15 minutes
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        ReconnectSettings {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff(),
            established_interval_secs: default_established_interval(),
        }
    }
}

// =============================================================================
// Retention Settings
// =============================================================================

/// Storage reclamation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Synced records older than this are eligible for deletion (days).
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// Interval between sweeps (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Delay before the first sweep after startup (seconds).
    #[serde(default = "default_sweep_initial_delay")]
    pub initial_delay_secs: u64,
}

fn default_horizon_days() -> i64 {
    7
}

fn default_sweep_interval() -> u64 {
    21_600 // 6 hours
}

fn default_sweep_initial_delay() -> u64 {
    60
}

impl Default for RetentionSettings {
    fn default() -> Self {
        RetentionSettings {
            horizon_days: default_horizon_days(),
            sweep_interval_secs: default_sweep_interval(),
            initial_delay_secs: default_sweep_initial_delay(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceSettings,

    /// Ingestion endpoint.
    #[serde(default)]
    pub ingest: IngestSettings,

    /// Batch drain behavior.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Liveness monitoring.
    #[serde(default)]
    pub liveness: LivenessSettings,

    /// Reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// Retention policy.
    #[serde(default)]
    pub retention: RetentionSettings,
}

impl SyncConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("no config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        let url = Url::parse(&self.ingest.base_url)?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(SyncError::InvalidUrl(format!(
                "base URL must be http(s) or ws(s), got: {}",
                self.ingest.base_url
            )));
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.categories.is_empty() {
            return Err(SyncError::InvalidConfig(
                "at least one category must be enabled".into(),
            ));
        }

        if self.liveness.timeout_secs <= self.liveness.check_interval_secs {
            return Err(SyncError::InvalidConfig(
                "liveness timeout must exceed the check interval".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("PULSE_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(source) = std::env::var("PULSE_SOURCE") {
            self.device.source = source;
        }

        if let Ok(url) = std::env::var("PULSE_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.ingest.base_url = url;
        }

        if let Ok(batch) = std::env::var("PULSE_BATCH_SIZE") {
            if let Ok(n) = batch.parse::<u32>() {
                self.sync.batch_size = n;
            }
        }

        if let Ok(interval) = std::env::var("PULSE_SYNC_INTERVAL_SECS") {
            if let Ok(n) = interval.parse::<u64>() {
                self.sync.interval_secs = n;
            }
        }

        if let Ok(days) = std::env::var("PULSE_RETENTION_DAYS") {
            if let Ok(n) = days.parse::<i64>() {
                self.retention.horizon_days = n;
            }
        }
    }

    /// Derives the realtime socket URL from the base endpoint.
    ///
    /// http → ws, https → wss, plus the fixed realtime path and the
    /// device id: `wss://host/realtime/<device_id>`.
    pub fn realtime_url(&self) -> SyncResult<String> {
        let mut url = Url::parse(&self.ingest.base_url)?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(SyncError::InvalidUrl(format!(
                    "unsupported scheme: {other}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| SyncError::InvalidUrl(self.ingest.base_url.clone()))?;

        url.path_segments_mut()
            .map_err(|_| SyncError::InvalidUrl("base URL cannot be a base".into()))?
            .pop_if_empty()
            .push("realtime")
            .push(&self.device.id);

        Ok(url.to_string())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "pulse", "telemetry")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Duration Accessors
    // =========================================================================

    /// Delay between records within a batch.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.sync.pacing_ms)
    }

    /// Interval between scheduled sync passes.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    /// Delay between connect and the initial sync pass.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.sync.settle_delay_ms)
    }

    /// Socket connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest.connect_timeout_secs)
    }

    /// Retention cutoff age.
    pub fn retention_horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention.horizon_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.device.id = "dev-123".to_string();
        config
    }

    #[test]
    fn test_default_config_values() {
        let config = SyncConfig::default();
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.pacing_ms, 50);
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.liveness.check_interval_secs, 5);
        assert_eq!(config.liveness.timeout_secs, 15);
        assert_eq!(config.liveness.heartbeat_interval_secs, 1);
        assert_eq!(config.reconnect.max_backoff_secs, 60);
        assert_eq!(config.reconnect.established_interval_secs, 900);
        assert_eq!(config.retention.horizon_days, 7);
        assert_eq!(config.sync.categories.len(), 5);
    }

    #[test]
    fn test_validation() {
        // Missing device id fails.
        assert!(matches!(
            SyncConfig::default().validate(),
            Err(SyncError::MissingDeviceId)
        ));

        let config = configured();
        assert!(config.validate().is_ok());

        let mut config = configured();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = configured();
        config.ingest.base_url = "ftp://nope".into();
        assert!(config.validate().is_err());

        let mut config = configured();
        config.liveness.timeout_secs = 5;
        config.liveness.check_interval_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_realtime_url_derivation() {
        let mut config = configured();

        config.ingest.base_url = "http://ingest.example.com:8080".into();
        assert_eq!(
            config.realtime_url().unwrap(),
            "ws://ingest.example.com:8080/realtime/dev-123"
        );

        config.ingest.base_url = "https://ingest.example.com".into();
        assert_eq!(
            config.realtime_url().unwrap(),
            "wss://ingest.example.com/realtime/dev-123"
        );

        // Already-ws URLs pass through.
        config.ingest.base_url = "wss://ingest.example.com".into();
        assert_eq!(
            config.realtime_url().unwrap(),
            "wss://ingest.example.com/realtime/dev-123"
        );

        // Trailing slash does not double up.
        config.ingest.base_url = "http://ingest.example.com/".into();
        assert_eq!(
            config.realtime_url().unwrap(),
            "ws://ingest.example.com/realtime/dev-123"
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = configured();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[sync]"));
        assert!(toml_str.contains("[retention]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.device.id, "dev-123");
        assert_eq!(parsed.sync.batch_size, 50);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "dev-9"

            [sync]
            batch_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(parsed.device.id, "dev-9");
        assert_eq!(parsed.sync.batch_size, 10);
        assert_eq!(parsed.sync.pacing_ms, 50); // default
        assert_eq!(parsed.retention.horizon_days, 7); // default
    }
}
