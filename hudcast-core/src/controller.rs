//! Capture controller.
//!
//! Owns the peripheral link and at most one [`CaptureSession`], and maps
//! host requests (start, stop, toggle, teardown) and device notifications
//! onto them. Observers can follow along through a status hook; the hook
//! never influences the pipeline.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capture::{CaptureConfiguration, CaptureProvider};
use crate::error::HudError;
use crate::link::{ConnectionState, DeviceEvent, PeripheralLink, Transition};
use crate::pipeline::{CaptureSession, StatsSnapshot};
use crate::protocol::HudCommand;
use crate::transport::ResponseHandler;

// ── StatusEvent ──────────────────────────────────────────────────

/// Something the host shell may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A device notification was applied to the link.
    Link(Transition),
    CaptureStarted { width: u32, height: u32 },
    CaptureStopped,
    /// The provider refused a display; the user must grant capture again.
    ConsentRequired,
    /// The HUD answered a command.
    Response(HudCommand),
}

impl StatusEvent {
    /// Whether this deserves user-facing feedback rather than a log line.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Self::Link(t) => matches!(
                t.to,
                ConnectionState::PermissionDenied | ConnectionState::Unsupported
            ),
            Self::ConsentRequired => true,
            Self::Response(cmd) => *cmd == HudCommand::HeartBeat,
            Self::CaptureStarted { .. } | Self::CaptureStopped => false,
        }
    }
}

/// Observer of [`StatusEvent`]s.
pub type StatusHook = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

fn notify(hook: Option<&StatusHook>, event: StatusEvent) {
    if let Some(hook) = hook {
        hook(&event);
    }
}

// ── Controller ───────────────────────────────────────────────────

pub struct Controller {
    provider: Arc<dyn CaptureProvider>,
    link: PeripheralLink,
    session: Option<CaptureSession>,
    status: Option<StatusHook>,
    event_pump: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Controller {
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            provider,
            link: PeripheralLink::new(),
            session: None,
            status: None,
            event_pump: None,
        }
    }

    pub fn with_status_hook(mut self, hook: StatusHook) -> Self {
        self.status = Some(hook);
        self
    }

    pub fn link(&self) -> &PeripheralLink {
        &self.link
    }

    pub fn is_capturing(&self) -> bool {
        self.session.is_some()
    }

    /// Counters of the live session, if any.
    pub fn session_stats(&self) -> Option<StatsSnapshot> {
        self.session.as_ref().map(CaptureSession::stats)
    }

    // ── Capture ──────────────────────────────────────────────────

    /// Start mirroring with `config`. A no-op while a session is live.
    pub fn start_capture(&mut self, config: CaptureConfiguration) -> Result<(), HudError> {
        if self.session.is_some() {
            debug!("capture already running");
            return Ok(());
        }
        let (width, height) = (config.width, config.height);
        match CaptureSession::start(config, self.provider.as_ref(), self.link.clone()) {
            Ok(session) => {
                info!("starting screen capture");
                self.session = Some(session);
                notify(
                    self.status.as_ref(),
                    StatusEvent::CaptureStarted { width, height },
                );
                Ok(())
            }
            Err(e @ HudError::DisplayUnavailable(_)) => {
                info!("screen capture not authorised: {e}");
                notify(self.status.as_ref(), StatusEvent::ConsentRequired);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the live session. Does nothing when none is running.
    pub async fn stop_capture(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.stop().await;
        notify(self.status.as_ref(), StatusEvent::CaptureStopped);
    }

    /// Start when idle, stop when capturing. Returns whether capture is
    /// now running.
    pub async fn toggle_capture(&mut self, config: CaptureConfiguration) -> Result<bool, HudError> {
        if self.is_capturing() {
            self.stop_capture().await;
            Ok(false)
        } else {
            self.start_capture(config)?;
            Ok(true)
        }
    }

    // ── Peripheral ───────────────────────────────────────────────

    /// Apply one device notification and report it.
    pub fn handle_device_event(&self, event: DeviceEvent) -> Transition {
        let transition = self.link.apply(event);
        notify(self.status.as_ref(), StatusEvent::Link(transition));
        transition
    }

    /// Consume device notifications from `events` on a background task
    /// until the sender is dropped or the controller is torn down.
    pub fn spawn_event_pump(&mut self, mut events: mpsc::Receiver<DeviceEvent>) {
        self.stop_event_pump();
        let link = self.link.clone();
        let status = self.status.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let transition = link.apply(event);
                notify(status.as_ref(), StatusEvent::Link(transition));
            }
        });
        self.event_pump = Some((cancel, handle));
    }

    /// Handler to give a transport so HUD responses are logged and
    /// reported.
    pub fn response_handler(&self) -> ResponseHandler {
        let status = self.status.clone();
        Arc::new(move |command: HudCommand, payload: Bytes| {
            info!("response {command} ({} bytes)", payload.len());
            notify(status.as_ref(), StatusEvent::Response(command));
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop capture, drop the capture authorisation and stop listening
    /// for device notifications. Safe to call repeatedly.
    pub async fn teardown(&mut self) {
        self.stop_capture().await;
        self.provider.shutdown();
        if let Some((cancel, handle)) = self.event_pump.take() {
            cancel.cancel();
            let _ = handle.await;
        }
    }

    fn stop_event_pump(&mut self) {
        if let Some((cancel, _)) = self.event_pump.take() {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("link", &self.link)
            .field("session", &self.session)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
