//! # Connection Manager
//!
//! Owns the single live socket to the ingestion service: connect,
//! registration, liveness tracking, heartbeat emission, reconnection.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Connection States                                   │
//! │                                                                         │
//! │  ┌────────────┐    connect      ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘                 └─────┬──────┘                         │
//! │        ▲                              │                                 │
//! │        │                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           ▼                           │
//! │        │              ┌────────────┐  ┌──────────────┐                 │
//! │        │              │ Connected  │  │ retry wait   │                 │
//! │        │              └─────┬──────┘  └─────┬────────┘                 │
//! │        │                    │               │                           │
//! │        │     close / error /│               │ timer expired /          │
//! │        │     liveness timeout               │ connect_now()            │
//! │        └────────────────────┴───────────────┘                          │
//! │                                                                         │
//! │  RECONNECT POLICY (two tiers)                                          │
//! │  ────────────────────────────                                          │
//! │  never connected yet:  exponential backoff, capped (≤60s)              │
//! │  established then lost: fixed long interval (15 min) - loss after      │
//! │                         success is usually a longer-lived outage       │
//! │                                                                         │
//! │  LIVENESS                                                              │
//! │  ────────                                                              │
//! │  The server pings; this client only pongs. A 5s check declares the     │
//! │  link dead when no server ping/pong was seen for 15s.                  │
//! │                                                                         │
//! │  On successful connect: device_register frame, liveness reset,         │
//! │  heartbeat start, Connected event (→ initial sync after settle).       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::dispatcher::DispatcherHandle;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{FrameMetadata, InboundFrame, OutboundFrame};

// =============================================================================
// Connection State
// =============================================================================

/// Connection state, rebuilt to `Disconnected` on process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Attempting to connect.
    Connecting,
    /// Connected and ready.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Events emitted to the agent's router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Socket opened and registration frame enqueued.
    Connected,
    /// Socket lost (error, close, or liveness timeout).
    Disconnected,
}

// =============================================================================
// Connection Configuration
// =============================================================================

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Derived realtime socket URL (ws(s)://…/realtime/<device_id>).
    pub url: String,

    /// Envelope metadata for frames this manager originates.
    pub device_id: String,
    pub source: String,

    /// Socket open timeout.
    pub connect_timeout: Duration,

    /// Initial backoff while never having connected.
    pub initial_backoff: Duration,

    /// Backoff cap while never having connected.
    pub max_backoff: Duration,

    /// Fixed retry interval after losing an established connection.
    pub established_retry: Duration,

    /// Liveness check cadence.
    pub liveness_check_interval: Duration,

    /// No-server-signal window after which the link is declared dead.
    pub liveness_timeout: Duration,

    /// Client heartbeat cadence.
    pub heartbeat_interval: Duration,
}

impl ConnectionConfig {
    fn metadata(&self) -> FrameMetadata {
        FrameMetadata {
            device_id: self.device_id.clone(),
            source: self.source.clone(),
        }
    }
}

// =============================================================================
// Connection Handle
// =============================================================================

/// Handle for observing and nudging the connection from other components.
#[derive(Clone)]
pub struct ConnectionHandle {
    state_rx: watch::Receiver<ConnectionState>,
    connect_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ConnectionHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// True if currently connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A watch receiver for state transitions (UI, tests).
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Preempts any pending reconnect wait and connects now.
    pub async fn connect_now(&self) {
        let _ = self.connect_tx.send(()).await;
    }

    /// Triggers graceful shutdown of the connection task.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }

    /// A detached handle pinned to one state, for unit tests that need a
    /// scheduler but no socket.
    #[cfg(test)]
    pub(crate) fn fixed(state: ConnectionState) -> ConnectionHandle {
        let (state_tx, state_rx) = watch::channel(state);
        let (connect_tx, _) = mpsc::channel(1);
        let (shutdown_tx, _) = mpsc::channel(1);
        // The watch receiver keeps serving the last value after the sender
        // drops; leak the sender so the state stays live.
        std::mem::forget(state_tx);
        ConnectionHandle {
            state_rx,
            connect_tx,
            shutdown_tx,
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Why the per-connection loop exited.
enum LoopExit {
    /// Transport-level failure: error, server close, or liveness timeout.
    /// All handled identically - reconnect.
    Transport,
    /// Engine shutdown.
    Shutdown,
}

/// The connection manager task. Owns the socket: the read half directly,
/// the write half via the dispatcher's sink slot.
pub struct Connection {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    dispatcher: DispatcherHandle,
    events_tx: mpsc::Sender<ConnectionEvent>,
    inbound_tx: mpsc::UnboundedSender<InboundFrame>,
    connect_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Connection {
    /// Creates the connection manager and spawns its run loop.
    ///
    /// `events_tx` receives connect/disconnect notifications;
    /// `inbound_tx` receives ack frames for the sync scheduler.
    pub fn spawn(
        config: ConnectionConfig,
        dispatcher: DispatcherHandle,
        events_tx: mpsc::Sender<ConnectionEvent>,
        inbound_tx: mpsc::UnboundedSender<InboundFrame>,
    ) -> ConnectionHandle {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (connect_tx, connect_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let connection = Connection {
            config,
            state_tx,
            dispatcher,
            events_tx,
            inbound_tx,
            connect_rx,
            shutdown_rx,
        };
        tokio::spawn(connection.run());

        ConnectionHandle {
            state_rx,
            connect_tx,
            shutdown_tx,
        }
    }

    /// Main connection loop: connect, serve, reconnect.
    async fn run(mut self) {
        info!(url = %self.config.url, "Connection manager starting");

        let mut backoff = create_backoff(self.config.initial_backoff, self.config.max_backoff);
        let mut ever_connected = false;

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }
            // Drain any stale connect_now nudge so it doesn't skip the
            // next retry wait.
            let _ = self.connect_rx.try_recv();

            self.set_state(ConnectionState::Connecting);

            match self.connect_with_timeout().await {
                Ok(ws_stream) => {
                    info!("Socket connected");
                    self.set_state(ConnectionState::Connected);
                    ever_connected = true;
                    backoff.reset();

                    let (sink, read) = ws_stream.split();
                    self.dispatcher.install_sink(sink).await;

                    // Re-announce the device id before anything else flows.
                    let register = OutboundFrame::device_register(self.config.metadata());
                    if self.dispatcher.enqueue(register).is_err() {
                        // Frame queue closed: the engine is going down.
                        break;
                    }

                    let _ = self.events_tx.send(ConnectionEvent::Connected).await;

                    let exit = self.connection_loop(read).await;
                    self.dispatcher.clear_sink().await;
                    self.set_state(ConnectionState::Disconnected);
                    let _ = self.events_tx.send(ConnectionEvent::Disconnected).await;

                    if matches!(exit, LoopExit::Shutdown) {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect");
                    self.set_state(ConnectionState::Disconnected);
                }
            }

            // Exactly one reconnect wait is pending at a time; connect_now
            // preempts it.
            let delay = reconnect_delay(ever_connected, self.config.established_retry, &mut backoff);
            debug!(?delay, ever_connected, "Waiting before reconnect");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                Some(_) = self.connect_rx.recv() => {
                    info!("Reconnect wait preempted by connect_now");
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Connection manager stopped");
    }

    /// Opens the socket, bounded by the connect timeout.
    async fn connect_with_timeout(
        &self,
    ) -> SyncResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        let connect_future = connect_async(self.config.url.as_str());

        match timeout(self.config.connect_timeout, connect_future).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(SyncError::from(e)),
            Err(_) => Err(SyncError::Timeout(self.config.connect_timeout.as_secs())),
        }
    }

    /// Per-connection loop: socket reads, liveness checks, heartbeats.
    ///
    /// The liveness check keeps ticking while reads are idle - every arm
    /// of the select suspends without blocking the others.
    async fn connection_loop(
        &mut self,
        mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    ) -> LoopExit {
        let mut liveness_check = tokio::time::interval(self.config.liveness_check_interval);
        liveness_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut last_liveness = Instant::now();

        loop {
            tokio::select! {
                message = read.next() => {
                    match message {
                        Some(Ok(WsMessage::Text(text))) => {
                            match InboundFrame::from_json(&text) {
                                Ok(frame) => self.handle_inbound(frame, &mut last_liveness),
                                Err(e) => warn!(error = %e, "Failed to parse inbound frame"),
                            }
                        }
                        Some(Ok(WsMessage::Ping(_))) => {
                            // Protocol-level ping; tungstenite queues the
                            // pong reply itself. Still server evidence.
                            last_liveness = Instant::now();
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            last_liveness = Instant::now();
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "Server closed the connection");
                            return LoopExit::Transport;
                        }
                        Some(Ok(WsMessage::Binary(_))) => {
                            warn!("Unexpected binary message");
                        }
                        Some(Ok(WsMessage::Frame(_))) => {
                            // Raw frame, ignore
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Socket read error");
                            return LoopExit::Transport;
                        }
                        None => {
                            info!("Socket stream ended");
                            return LoopExit::Transport;
                        }
                    }
                }

                _ = liveness_check.tick() => {
                    let silent_for = last_liveness.elapsed();
                    if silent_for > self.config.liveness_timeout {
                        warn!(
                            silent_secs = silent_for.as_secs(),
                            "No server liveness signal, forcing disconnect"
                        );
                        return LoopExit::Transport;
                    }
                }

                _ = heartbeat.tick() => {
                    let frame = OutboundFrame::heartbeat(self.config.metadata());
                    if self.dispatcher.enqueue(frame).is_err() {
                        return LoopExit::Shutdown;
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown during active connection");
                    return LoopExit::Shutdown;
                }
            }
        }
    }

    /// Routes one inbound frame.
    fn handle_inbound(&self, frame: InboundFrame, last_liveness: &mut Instant) {
        if frame.is_liveness_signal() {
            *last_liveness = Instant::now();
        }

        match &frame {
            InboundFrame::HealthCheckPing { id } => {
                debug!(ping_id = ?id, "Health check ping");
                let pong =
                    OutboundFrame::health_check_pong(id.as_deref(), self.config.metadata());
                if self.dispatcher.enqueue(pong).is_err() {
                    warn!("Frame queue closed, cannot reply to ping");
                }
            }
            InboundFrame::Pong => debug!("Pong received"),
            InboundFrame::ConnectionEstablished => debug!("Connection established frame"),
            InboundFrame::DeviceRegistered => info!("Device registration confirmed"),
            InboundFrame::HeartbeatAck => {
                // Informational only; deliberately does not touch
                // last_liveness.
                debug!("Heartbeat ack");
            }
            InboundFrame::DataAck { message_id } | InboundFrame::AudioAck { message_id } => {
                debug!(message_id = %message_id, kind = frame.kind_name(), "Ack received");
                if self.inbound_tx.send(frame.clone()).is_err() {
                    warn!("Ack channel closed, dropping ack");
                }
            }
            InboundFrame::Error { message } | InboundFrame::DataError { message } => {
                // Non-fatal: the unacked record stays buffered and is
                // retried on the next pass.
                warn!(kind = frame.kind_name(), message = ?message, "Server reported error");
            }
            InboundFrame::Unknown => debug!("Ignoring unknown inbound frame kind"),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = %current, to = %state, "Connection state change");
                *current = state;
                true
            }
        });
    }
}

// =============================================================================
// Reconnect Policy
// =============================================================================

/// Creates the pre-first-success exponential backoff.
fn create_backoff(initial: Duration, max: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: initial,
        max_interval: max,
        multiplier: 2.0,
        max_elapsed_time: None, // retry forever
        ..Default::default()
    }
}

/// Picks the delay before the next reconnect attempt.
///
/// Exponential (bounded) while no connection has ever succeeded; a fixed
/// long interval once an established connection was lost.
fn reconnect_delay(
    ever_connected: bool,
    established_retry: Duration,
    backoff: &mut ExponentialBackoff,
) -> Duration {
    if ever_connected {
        established_retry
    } else {
        backoff
            .next_backoff()
            .unwrap_or(backoff.max_interval)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }

    #[test]
    fn test_reconnect_delay_is_bounded_before_first_success() {
        let mut backoff = create_backoff(Duration::from_millis(500), Duration::from_secs(60));
        let established = Duration::from_secs(900);

        // Jitter is ±50%, so every delay stays within 1.5x the 60s cap and
        // never reaches the established-loss interval.
        for _ in 0..20 {
            let delay = reconnect_delay(false, established, &mut backoff);
            assert!(delay <= Duration::from_secs(90));
            assert!(delay < established);
        }

        // Once the interval has grown to the cap, delays sit in the
        // jittered band around it.
        let capped = reconnect_delay(false, established, &mut backoff);
        assert!(capped >= Duration::from_secs(30));
    }

    #[test]
    fn test_reconnect_delay_is_fixed_after_established_loss() {
        let mut backoff = create_backoff(Duration::from_millis(500), Duration::from_secs(60));
        let established = Duration::from_secs(900);

        for _ in 0..3 {
            assert_eq!(
                reconnect_delay(true, established, &mut backoff),
                Duration::from_secs(900)
            );
        }
    }
}
