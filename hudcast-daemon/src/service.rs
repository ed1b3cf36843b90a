//! Mirroring service core logic.
//!
//! Owns the [`Controller`], keeps the capture session running and
//! maintains the link to the HUD bridge, reconnecting after failures.
//! Link changes reach the controller as device notifications, the same
//! way a device-enumeration service would report them.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hudcast_core::capture::pattern::PatternProvider;
use hudcast_core::{
    CaptureProvider, Controller, DeviceEvent, HudCommand, QueuedTransport, ResponseHandler,
    StatusEvent, Transport,
};

use crate::config::DaemonConfig;

pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

// ── HudService ───────────────────────────────────────────────────

/// The top-level mirroring service.
pub struct HudService {
    config: DaemonConfig,
    provider: Arc<dyn CaptureProvider>,
    stop: CancellationToken,
}

impl HudService {
    /// A service capturing from the synthetic pattern source.
    pub fn new(config: DaemonConfig) -> Self {
        Self::with_provider(config, Arc::new(PatternProvider::new()))
    }

    pub fn with_provider(config: DaemonConfig, provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            config,
            provider,
            stop: CancellationToken::new(),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Run the service until stopped.
    ///
    /// 1. Starts capture with the configured virtual display.
    /// 2. Connects to the HUD bridge and sends a heartbeat.
    /// 3. Reports the link as granted until the bridge goes away.
    /// 4. Waits `reconnect_ms` and tries again.
    /// 5. Tears everything down once stopped.
    pub async fn run(&self) -> Result<(), ServiceError> {
        let mut controller =
            Controller::new(Arc::clone(&self.provider)).with_status_hook(Arc::new(log_status));
        let (events, rx) = mpsc::channel(8);
        controller.spawn_event_pump(rx);

        if let Err(e) = controller.start_capture(self.config.to_capture_config()) {
            controller.teardown().await;
            return Err(e.into());
        }

        let result = self.link_loop(controller.response_handler(), &events).await;

        controller.teardown().await;
        info!("HUD mirroring stopped");
        result
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn link_loop(
        &self,
        on_response: ResponseHandler,
        events: &mpsc::Sender<DeviceEvent>,
    ) -> Result<(), ServiceError> {
        let peripheral = &self.config.peripheral;
        let retry = Duration::from_millis(peripheral.reconnect_ms);

        while !self.stop.is_cancelled() {
            events.send(DeviceEvent::PermissionRequested).await?;

            let connect = tokio::select! {
                result = TcpStream::connect(&peripheral.address) => result,
                _ = self.stop.cancelled() => break,
            };

            match connect {
                Ok(stream) => {
                    info!("HUD bridge reached at {}", peripheral.address);
                    let _ = stream.set_nodelay(true);
                    let transport = QueuedTransport::spawn(
                        stream,
                        peripheral.queue_depth,
                        Some(Arc::clone(&on_response)),
                    );
                    transport.send_command(HudCommand::HeartBeat, Bytes::new());
                    events
                        .send(DeviceEvent::PermissionGranted(transport.clone()))
                        .await?;

                    tokio::select! {
                        _ = transport.closed() => {}
                        _ = self.stop.cancelled() => {}
                    }
                    transport.close();
                    if transport.dropped_frames() > 0 {
                        info!("{} frames dropped on a busy link", transport.dropped_frames());
                    }
                    events.send(DeviceEvent::Detached).await?;
                }
                Err(e) => {
                    warn!("HUD bridge {} unreachable: {e}", peripheral.address);
                    events.send(DeviceEvent::NoDevice).await?;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(retry) => {}
                _ = self.stop.cancelled() => break,
            }
        }
        Ok(())
    }
}

/// Surface the events a user should see.
fn log_status(event: &StatusEvent) {
    if !event.is_user_facing() {
        return;
    }
    match event {
        StatusEvent::Link(t) => warn!("HUD {}", t.to),
        StatusEvent::ConsentRequired => warn!("screen capture needs consent"),
        StatusEvent::Response(cmd) => info!("HUD answered {cmd}"),
        StatusEvent::CaptureStarted { .. } | StatusEvent::CaptureStopped => {}
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use hudcast_core::{HudCodec, PacketKind};
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    fn config_for(address: String) -> DaemonConfig {
        let mut cfg = DaemonConfig::default();
        cfg.peripheral.address = address;
        cfg.peripheral.reconnect_ms = 20;
        cfg.capture.width = 16;
        cfg.capture.height = 8;
        cfg.capture.frame_rate = 40;
        cfg
    }

    #[tokio::test]
    async fn heartbeat_then_images() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(HudService::new(config_for(addr.to_string())));
        let stop = service.stop_handle();
        let task = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.run().await }
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut hud = Framed::new(stream, HudCodec);
        let first = hud.next().await.unwrap().unwrap();
        assert_eq!(first.kind(), PacketKind::Command);
        assert_eq!(first.hud_command().unwrap(), HudCommand::HeartBeat);

        let image = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let pkt = hud.next().await.unwrap().unwrap();
                if pkt.kind() == PacketKind::Image {
                    return pkt;
                }
            }
        })
        .await
        .expect("no image received");
        assert_eq!(image.image_size(), Some((16, 8)));

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_bridge_keeps_retrying_until_stopped() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let service = Arc::new(HudService::new(config_for(addr.to_string())));
        let task = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.run().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        service.stop();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn missing_consent_fails_run() {
        let provider = Arc::new(PatternProvider::without_consent());
        let service = HudService::with_provider(DaemonConfig::default(), provider);
        assert!(service.run().await.is_err());
    }
}
