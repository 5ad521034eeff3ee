//! End-to-end tests: a full agent against an in-process WebSocket server.
//!
//! The server plays the ingestion service: it accepts the realtime socket,
//! confirms registration, acks data frames, and (per test) probes liveness
//! or goes silent to force a reconnect.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use pulse_core::{Category, Record, RecordPayload};
use pulse_db::{Database, DbConfig};
use pulse_sync::{ConnectionState, SyncAgent, SyncConfig};

// =============================================================================
// Test Server
// =============================================================================

#[derive(Clone, Copy)]
struct ServerBehavior {
    /// Reply to data frames with data_ack.
    ack_data: bool,
    /// Send one health_check_ping right after the handshake.
    send_ping: bool,
}

/// Spawns a WebSocket server on an ephemeral port.
///
/// Returns the port, a receiver of every frame the server reads, and a
/// counter of accepted connections.
async fn spawn_server(
    behavior: ServerBehavior,
) -> (u16, mpsc::UnboundedReceiver<Value>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));

    let conn_counter = connections.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            conn_counter.fetch_add(1, Ordering::SeqCst);

            let frames_tx = frames_tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };

                let _ = ws
                    .send(Message::Text(
                        json!({"type": "connection_established"}).to_string().into(),
                    ))
                    .await;

                if behavior.send_ping {
                    let _ = ws
                        .send(Message::Text(
                            json!({"type": "health_check_ping", "id": "ping-1"})
                                .to_string()
                                .into(),
                        ))
                        .await;
                }

                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let _ = frames_tx.send(frame.clone());

                    match frame["type"].as_str() {
                        Some("device_register") => {
                            let _ = ws
                                .send(Message::Text(
                                    json!({"type": "device_registered"}).to_string().into(),
                                ))
                                .await;
                        }
                        Some("data") if behavior.ack_data => {
                            let _ = ws
                                .send(Message::Text(
                                    json!({
                                        "type": "data_ack",
                                        "message_id": frame["id"],
                                    })
                                    .to_string()
                                    .into(),
                                ))
                                .await;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    (port, frames_rx, connections)
}

fn test_config(port: u16) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.device.id = "dev-e2e".into();
    config.ingest.base_url = format!("http://127.0.0.1:{port}");
    config.sync.settle_delay_ms = 100;
    config.sync.pacing_ms = 5;
    // The test servers don't ping on their own; keep liveness out of the
    // way unless a test exercises it.
    config.liveness.check_interval_secs = 5;
    config.liveness.timeout_secs = 60;
    config
}

/// Polls `check` until it returns true or the deadline passes.
async fn wait_until<F, Fut>(what: &str, deadline: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let end = tokio::time::Instant::now() + deadline;
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < end,
            "timed out waiting for: {what}"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Drains frames until one matches, or panics at the deadline.
async fn wait_for_frame(
    rx: &mut mpsc::UnboundedReceiver<Value>,
    what: &str,
    deadline: Duration,
    mut matches: impl FnMut(&Value) -> bool,
) -> Value {
    let result = tokio::time::timeout(deadline, async {
        loop {
            let Some(frame) = rx.recv().await else {
                panic!("frame channel closed while waiting for: {what}");
            };
            if matches(&frame) {
                return frame;
            }
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("timed out waiting for frame: {what}"))
}

// =============================================================================
// Tests
// =============================================================================

/// The §offline-then-drain scenario: a record appended while disconnected
/// is delivered and marked synced after the socket comes up.
#[tokio::test]
async fn offline_backlog_drains_after_connect() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let store = db.records();

    // Buffered while no agent (and no network path) exists at all.
    let record = Record::new(
        "dev-e2e",
        RecordPayload::Gps {
            latitude: 37.0,
            longitude: -122.0,
            altitude: 15.0,
            accuracy: 3.0,
            heading: 90.0,
            speed: 0.5,
        },
    );
    store.append(&record).await.unwrap();
    assert_eq!(store.unsynced_count(Category::Gps).await.unwrap(), 1);

    let (port, mut frames, _conns) = spawn_server(ServerBehavior {
        ack_data: true,
        send_ping: false,
    })
    .await;

    let agent = SyncAgent::start(test_config(port), db.clone())
        .await
        .unwrap();

    // Registration precedes any data on the wire.
    wait_for_frame(&mut frames, "device_register", Duration::from_secs(10), |f| {
        f["type"] == "device_register"
    })
    .await;

    let data = wait_for_frame(&mut frames, "data frame", Duration::from_secs(10), |f| {
        f["type"] == "data"
    })
    .await;
    assert_eq!(data["id"], record.id.as_str());
    assert_eq!(data["payload"]["message_type_id"], "gps");
    assert_eq!(data["payload"]["data"]["latitude"], 37.0);
    assert_eq!(data["metadata"]["device_id"], "dev-e2e");

    // The server's ack flips the record to synced.
    wait_until("record marked synced", Duration::from_secs(10), || {
        let store = store.clone();
        async move { store.unsynced_count(Category::Gps).await.unwrap() == 0 }
    })
    .await;

    agent.shutdown().await;
}

/// The sensor fast path: a reading submitted while connected is sent
/// immediately (no scheduler pass needed) and acked; server pings get an
/// echoing pong.
#[tokio::test]
async fn fast_path_send_and_ping_pong() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let store = db.records();

    let (port, mut frames, _conns) = spawn_server(ServerBehavior {
        ack_data: true,
        send_ping: true,
    })
    .await;

    let mut config = test_config(port);
    // Make the periodic pass irrelevant: only the fast path can deliver
    // within the test deadline.
    config.sync.interval_secs = 3600;

    let agent = SyncAgent::start(config, db.clone()).await.unwrap();

    wait_until("connected", Duration::from_secs(10), || {
        let state = agent.connection_state();
        async move { state == ConnectionState::Connected }
    })
    .await;

    // The ping sent at handshake time must come back as a pong echoing
    // its id.
    let pong = wait_for_frame(
        &mut frames,
        "health_check_pong",
        Duration::from_secs(10),
        |f| f["type"] == "health_check_pong",
    )
    .await;
    assert_eq!(pong["payload"]["ping_id"], "ping-1");

    // Submit while connected: durable buffer + immediate send.
    let record = Record::new(
        "dev-e2e",
        RecordPayload::HeartRate {
            bpm: 72.0,
            confidence: 0.99,
        },
    );
    agent.sink().submit(record.clone()).unwrap();

    let data = wait_for_frame(&mut frames, "data frame", Duration::from_secs(10), |f| {
        f["type"] == "data"
    })
    .await;
    assert_eq!(data["id"], record.id.as_str());
    assert_eq!(data["payload"]["message_type_id"], "heart_rate");

    wait_until("record marked synced", Duration::from_secs(10), || {
        let store = store.clone();
        async move { store.unsynced_count(Category::HeartRate).await.unwrap() == 0 }
    })
    .await;

    // Heartbeats flow as presence signals (1s cadence).
    wait_for_frame(&mut frames, "heartbeat", Duration::from_secs(10), |f| {
        f["type"] == "heartbeat"
    })
    .await;

    agent.shutdown().await;
}

/// A server that never pings trips the liveness timeout; the connection
/// manager force-disconnects and reconnects on its own.
#[tokio::test]
async fn liveness_timeout_forces_reconnect() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let (port, _frames, connections) = spawn_server(ServerBehavior {
        ack_data: false,
        send_ping: false,
    })
    .await;

    let mut config = test_config(port);
    config.liveness.check_interval_secs = 1;
    config.liveness.timeout_secs = 2;
    // Established-loss retry shortened so the reconnect lands in the test
    // window.
    config.reconnect.established_interval_secs = 1;

    let agent = SyncAgent::start(config, db).await.unwrap();

    // First connection comes up.
    wait_until("first connect", Duration::from_secs(10), || {
        let state = agent.connection_state();
        async move { state == ConnectionState::Connected }
    })
    .await;

    // With no server ping/pong ever arriving, the liveness check declares
    // the link dead and a second connection is made.
    wait_until("reconnect after liveness timeout", Duration::from_secs(15), || {
        let count = connections.load(Ordering::SeqCst);
        async move { count >= 2 }
    })
    .await;

    agent.shutdown().await;
}
