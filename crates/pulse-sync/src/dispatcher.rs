//! # Outbound Dispatcher
//!
//! Single-consumer FIFO of outbound frames; the worker is the ONLY writer
//! to the socket.
//!
//! ## Why a Single Writer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbound Dispatcher Flow                             │
//! │                                                                         │
//! │  PRODUCERS (concurrent)                                                │
//! │  ──────────────────────                                                │
//! │  • sensor "send now" fast path                                         │
//! │  • heartbeat loop                                                      │
//! │  • health_check_pong replies                                           │
//! │  • device_register on connect                                          │
//! │  • sync scheduler batches                                              │
//! │       │                                                                 │
//! │       ▼  enqueue (unbounded FIFO)                                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Dispatcher worker                            │   │
//! │  │                                                                 │   │
//! │  │  dequeue frame                                                  │   │
//! │  │    ├── sink installed? serialize + write                        │   │
//! │  │    └── no live sink?   DROP + log                               │   │
//! │  │                                                                 │   │
//! │  │  At-most-once at the transport layer. Durability is the         │   │
//! │  │  Record Store's job: an unacked data frame stays unsynced       │   │
//! │  │  and the next sync pass resends it.                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼  the one and only socket write path                            │
//! │  WebSocket write half (installed/cleared by the Connection Manager)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::protocol::OutboundFrame;

/// The WebSocket write half.
pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Shared slot holding the currently-live write half, if any.
type SinkSlot = Arc<Mutex<Option<WsSink>>>;

// =============================================================================
// Dispatcher Handle
// =============================================================================

/// Handle for enqueueing frames and managing the live sink.
#[derive(Clone)]
pub struct DispatcherHandle {
    queue_tx: mpsc::UnboundedSender<OutboundFrame>,
    sink: SinkSlot,
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Enqueues a fully-formed frame.
    ///
    /// Never blocks: the queue is unbounded. Fails only once the engine is
    /// shutting down and the queue is closed.
    pub fn enqueue(&self, frame: OutboundFrame) -> SyncResult<()> {
        self.queue_tx
            .send(frame)
            .map_err(|_| SyncError::ChannelError("frame queue closed".into()))
    }

    /// Installs the write half of a freshly-opened socket.
    ///
    /// Called by the Connection Manager on connect; frames dequeued from
    /// now on are written to this sink.
    pub(crate) async fn install_sink(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
        debug!("Socket write half installed");
    }

    /// Removes (and closes) the current sink, if any.
    ///
    /// Called by the Connection Manager on disconnect; subsequent frames
    /// are dropped until a new sink is installed.
    pub(crate) async fn clear_sink(&self) {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
            debug!("Socket write half cleared");
        }
    }

    /// Closes the queue; the worker drains nothing further and exits.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Dispatcher Worker
// =============================================================================

/// The outbound dispatcher worker.
pub struct Dispatcher {
    queue_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    sink: SinkSlot,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Dispatcher {
    /// Creates the dispatcher and spawns its worker task.
    pub fn spawn() -> DispatcherHandle {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let sink: SinkSlot = Arc::new(Mutex::new(None));

        let worker = Dispatcher {
            queue_rx,
            sink: sink.clone(),
            shutdown_rx,
        };
        tokio::spawn(worker.run());

        DispatcherHandle {
            queue_tx,
            sink,
            shutdown_tx,
        }
    }

    /// Worker loop: drains the queue onto the live socket.
    async fn run(mut self) {
        info!("Outbound dispatcher starting");

        loop {
            tokio::select! {
                frame = self.queue_rx.recv() => {
                    match frame {
                        Some(frame) => self.write_frame(frame).await,
                        // All senders dropped: nothing left to dispatch.
                        None => break,
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Outbound dispatcher shutting down");
                    break;
                }
            }
        }

        // Close the socket politely if one is still live.
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }

        info!("Outbound dispatcher stopped");
    }

    async fn write_frame(&self, frame: OutboundFrame) {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => {
                let json = frame.to_json();
                if let Err(e) = sink.send(WsMessage::Text(json.into())).await {
                    // The read loop observes the same failure and drives
                    // the reconnect; clearing the slot here stops further
                    // writes against a dead socket.
                    warn!(
                        frame_id = %frame.id,
                        kind = %frame.kind,
                        error = %e,
                        "Socket write failed, clearing sink"
                    );
                    *guard = None;
                } else {
                    debug!(frame_id = %frame.id, kind = %frame.kind, "Frame sent");
                }
            }
            None => {
                // At-most-once transport: the durable buffer retries data
                // frames, everything else is disposable.
                warn!(
                    frame_id = %frame.id,
                    kind = %frame.kind,
                    "Not connected, dropping outbound frame"
                );
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameMetadata;

    fn metadata() -> FrameMetadata {
        FrameMetadata {
            device_id: "dev-1".into(),
            source: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_without_sink_drops_frame() {
        let handle = Dispatcher::spawn();

        // No sink installed: the worker must consume (and drop) the frame
        // without erroring or blocking the queue.
        handle
            .enqueue(OutboundFrame::heartbeat(metadata()))
            .unwrap();
        handle
            .enqueue(OutboundFrame::device_register(metadata()))
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails_cleanly() {
        let handle = Dispatcher::spawn();
        handle.shutdown().await;

        // Give the worker a moment to exit; the queue may still accept
        // sends until the receiver drops, so poll for the closed state.
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if handle.enqueue(OutboundFrame::heartbeat(metadata())).is_err() {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "queue never closed after shutdown"
            );
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
