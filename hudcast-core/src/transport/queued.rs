//! Stream-backed transport with a bounded send queue.
//!
//! Mirrors a managed connection: a writer task drains the queue into a
//! [`HudCodec`]-framed stream and a reader task routes responses from the
//! HUD. `send` never waits; when the peripheral falls behind and the
//! queue is full, the frame is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pipeline::ConvertedBitmap;
use crate::protocol::{HudCodec, HudCommand, HudPacket, PacketKind};
use crate::transport::Transport;

/// Receives every response packet the HUD sends back.
pub type ResponseHandler = Arc<dyn Fn(HudCommand, Bytes) + Send + Sync>;

/// A [`Transport`] over any async byte stream.
#[derive(Debug)]
pub struct QueuedTransport {
    tx: mpsc::Sender<HudPacket>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl QueuedTransport {
    /// Start the writer and reader tasks on `stream`.
    ///
    /// At most `queue_depth` packets wait for the writer.
    pub fn spawn<S>(stream: S, queue_depth: usize, on_response: Option<ResponseHandler>) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(stream, HudCodec).split();
        let (tx, mut rx) = mpsc::channel::<HudPacket>(queue_depth.max(1));
        let cancel = CancellationToken::new();

        // Writer task: queue -> HUD
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                let packet = tokio::select! {
                    _ = token.cancelled() => break,
                    packet = rx.recv() => match packet {
                        Some(packet) => packet,
                        None => break,
                    },
                };
                if let Err(e) = net_writer.send(packet).await {
                    warn!("HUD write error: {e}");
                    break;
                }
            }
            token.cancel();
        });

        // Reader task: HUD -> response handler
        let token = cancel.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = net_reader.next() => next,
                };
                match next {
                    Some(Ok(packet)) => route_response(packet, on_response.as_ref()),
                    Some(Err(e)) => {
                        warn!("HUD read error: {e}");
                        break;
                    }
                    None => {
                        debug!("HUD closed the link");
                        break;
                    }
                }
            }
            token.cancel();
        });

        Arc::new(Self {
            tx,
            cancel,
            dropped: AtomicU64::new(0),
        })
    }

    /// Stop both tasks. Queued packets are discarded.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the link is gone, from either side.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Frames discarded because the queue was full.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, packet: HudPacket) {
        if self.is_closed() {
            return;
        }
        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(packet)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("HUD queue full; dropping {:?} packet", packet.kind());
            }
            Err(TrySendError::Closed(_)) => debug!("HUD link closed; packet discarded"),
        }
    }
}

impl Transport for QueuedTransport {
    fn send(&self, bitmap: ConvertedBitmap) {
        self.enqueue(HudPacket::image(&bitmap));
    }

    fn send_command(&self, command: HudCommand, payload: Bytes) {
        self.enqueue(HudPacket::command(command, payload));
    }
}

impl Drop for QueuedTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn route_response(packet: HudPacket, handler: Option<&ResponseHandler>) {
    if packet.kind() != PacketKind::Response {
        debug!("ignoring {:?} packet from HUD", packet.kind());
        return;
    }
    match packet.hud_command() {
        Ok(command) => {
            if let Some(handler) = handler {
                handler(command, packet.payload().clone());
            }
        }
        Err(e) => warn!("response not handled: {e}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────
