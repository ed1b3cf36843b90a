//! Peripheral connection state machine.
//!
//! Attach, permission and detach notifications arrive asynchronously from
//! the USB/serial collaborator. Each one moves the link to a fixed target
//! state regardless of where it was, so there is no invalid transition:
//!
//! ```text
//!  PermissionGranted ──► Connected        (stores the transport handle)
//!  PermissionDenied  ──► PermissionDenied
//!  NoDevice          ──► Disconnected
//!  Detached          ──► Disconnected
//!  Unsupported       ──► Unsupported
//!  PermissionRequested ► PermissionPending
//! ```
//!
//! Frames are only dispatched while the link is `Connected`.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::transport::TransportHandle;

// ── ConnectionState ──────────────────────────────────────────────

/// Where the HUD peripheral currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No device attached. Initial state.
    #[default]
    Disconnected,
    /// A device is attached and the user has been asked for access.
    PermissionPending,
    /// The user refused access to the device.
    PermissionDenied,
    /// Access granted; frames may be sent.
    Connected,
    /// The attached device is not a HUD we can drive.
    Unsupported,
}

impl ConnectionState {
    pub const ALL: [ConnectionState; 5] = [
        Self::Disconnected,
        Self::PermissionPending,
        Self::PermissionDenied,
        Self::Connected,
        Self::Unsupported,
    ];

    /// The state reached from `self` on `event`. Defined for every pair.
    pub fn on_event(self, event: LinkEvent) -> ConnectionState {
        match event {
            LinkEvent::PermissionGranted => Self::Connected,
            LinkEvent::PermissionDenied => Self::PermissionDenied,
            LinkEvent::NoDevice | LinkEvent::Detached => Self::Disconnected,
            LinkEvent::Unsupported => Self::Unsupported,
            LinkEvent::PermissionRequested => Self::PermissionPending,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::PermissionPending => write!(f, "PermissionPending"),
            Self::PermissionDenied => write!(f, "PermissionDenied"),
            Self::Connected => write!(f, "Connected"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Kind of a connection notification, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEvent {
    PermissionGranted,
    PermissionDenied,
    NoDevice,
    Detached,
    Unsupported,
    PermissionRequested,
}

impl LinkEvent {
    pub const ALL: [LinkEvent; 6] = [
        Self::PermissionGranted,
        Self::PermissionDenied,
        Self::NoDevice,
        Self::Detached,
        Self::Unsupported,
        Self::PermissionRequested,
    ];
}

/// A notification from the device-enumeration collaborator.
#[derive(Clone)]
pub enum DeviceEvent {
    /// Access granted; carries the transport for the opened device.
    PermissionGranted(TransportHandle),
    PermissionDenied,
    NoDevice,
    Detached,
    Unsupported,
    PermissionRequested,
}

impl DeviceEvent {
    pub fn kind(&self) -> LinkEvent {
        match self {
            Self::PermissionGranted(_) => LinkEvent::PermissionGranted,
            Self::PermissionDenied => LinkEvent::PermissionDenied,
            Self::NoDevice => LinkEvent::NoDevice,
            Self::Detached => LinkEvent::Detached,
            Self::Unsupported => LinkEvent::Unsupported,
            Self::PermissionRequested => LinkEvent::PermissionRequested,
        }
    }
}

impl std::fmt::Debug for DeviceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.kind(), f)
    }
}

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub event: LinkEvent,
}

// ── PeripheralLink ───────────────────────────────────────────────

struct LinkInner {
    state: ConnectionState,
    transport: Option<TransportHandle>,
}

/// Shared, thread-safe view of the peripheral connection.
///
/// One writer (the event source) and one reader (the capture worker)
/// use it concurrently. State and transport handle live under the same
/// lock so a reader never sees `Connected` without its handle, or a
/// handle that belongs to a previous connection.
#[derive(Clone)]
pub struct PeripheralLink {
    inner: Arc<RwLock<LinkInner>>,
}

impl PeripheralLink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(LinkInner {
                state: ConnectionState::Disconnected,
                transport: None,
            })),
        }
    }

    /// Apply a device notification.
    pub fn apply(&self, event: DeviceEvent) -> Transition {
        let kind = event.kind();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let from = inner.state;
        let to = from.on_event(kind);
        inner.state = to;
        inner.transport = match event {
            DeviceEvent::PermissionGranted(transport) => Some(transport),
            _ => None,
        };
        drop(inner);

        if from != to {
            match to {
                ConnectionState::Connected => info!("HUD connected"),
                _ if from.is_connected() => info!("HUD disconnected ({to})"),
                _ => info!("HUD link {from} -> {to}"),
            }
        }
        Transition {
            from,
            to,
            event: kind,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Whether frames may be dispatched right now.
    pub fn is_ready(&self) -> bool {
        self.state().is_connected()
    }

    /// The live transport, or `None` unless connected.
    pub fn ready_transport(&self) -> Option<TransportHandle> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if inner.state.is_connected() {
            inner.transport.clone()
        } else {
            None
        }
    }
}

impl Default for PeripheralLink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PeripheralLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeripheralLink")
            .field("state", &self.state())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ConvertedBitmap;
    use crate::protocol::HudCommand;
    use crate::transport::Transport;
    use bytes::Bytes;

    struct NullTransport;

    impl Transport for NullTransport {
        fn send(&self, _bitmap: ConvertedBitmap) {}
        fn send_command(&self, _command: HudCommand, _payload: Bytes) {}
    }

    fn expected(event: LinkEvent) -> ConnectionState {
        match event {
            LinkEvent::PermissionGranted => ConnectionState::Connected,
            LinkEvent::PermissionDenied => ConnectionState::PermissionDenied,
            LinkEvent::NoDevice => ConnectionState::Disconnected,
            LinkEvent::Detached => ConnectionState::Disconnected,
            LinkEvent::Unsupported => ConnectionState::Unsupported,
            LinkEvent::PermissionRequested => ConnectionState::PermissionPending,
        }
    }

    fn device_event(kind: LinkEvent) -> DeviceEvent {
        match kind {
            LinkEvent::PermissionGranted => DeviceEvent::PermissionGranted(Arc::new(NullTransport)),
            LinkEvent::PermissionDenied => DeviceEvent::PermissionDenied,
            LinkEvent::NoDevice => DeviceEvent::NoDevice,
            LinkEvent::Detached => DeviceEvent::Detached,
            LinkEvent::Unsupported => DeviceEvent::Unsupported,
            LinkEvent::PermissionRequested => DeviceEvent::PermissionRequested,
        }
    }

    #[test]
    fn transition_table_is_total() {
        for from in ConnectionState::ALL {
            for event in LinkEvent::ALL {
                assert_eq!(from.on_event(event), expected(event), "{from} on {event:?}");
            }
        }
    }

    #[test]
    fn link_follows_table_from_every_state() {
        for from in ConnectionState::ALL {
            for event in LinkEvent::ALL {
                let link = PeripheralLink::new();
                link.apply(device_event(
                    LinkEvent::ALL
                        .into_iter()
                        .find(|e| expected(*e) == from)
                        .unwrap(),
                ));
                assert_eq!(link.state(), from);

                let t = link.apply(device_event(event));
                assert_eq!(t.from, from);
                assert_eq!(t.to, expected(event));
                assert_eq!(link.state(), expected(event));
                assert_eq!(link.is_ready(), event == LinkEvent::PermissionGranted);
                assert_eq!(
                    link.ready_transport().is_some(),
                    event == LinkEvent::PermissionGranted
                );
            }
        }
    }

    #[test]
    fn starts_disconnected() {
        let link = PeripheralLink::default();
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_ready());
        assert!(link.ready_transport().is_none());
    }

    #[test]
    fn leaving_connected_drops_transport() {
        let link = PeripheralLink::new();
        link.apply(DeviceEvent::PermissionGranted(Arc::new(NullTransport)));
        assert!(link.ready_transport().is_some());
        link.apply(DeviceEvent::Detached);
        assert!(link.ready_transport().is_none());
        link.apply(DeviceEvent::PermissionGranted(Arc::new(NullTransport)));
        assert!(link.is_ready());
    }

    #[test]
    fn clones_share_state() {
        let link = PeripheralLink::new();
        let reader = link.clone();
        link.apply(DeviceEvent::Unsupported);
        assert_eq!(reader.state(), ConnectionState::Unsupported);
    }
}
