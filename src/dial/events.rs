//! Host lifecycle events and the handle used to deliver them

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dial::settings::DialSettings;
use crate::dial::surface::DialSurface;

/// Events delivered to a dial controller
pub enum DialEvent {
    /// Action became visible
    WillAppear {
        action: Arc<dyn DialSurface>,
        settings: DialSettings,
    },
    /// Host persisted new settings
    DidReceiveSettings { settings: DialSettings },
    /// Dial turned by `ticks` detents (negative = down)
    Rotate {
        action: Arc<dyn DialSurface>,
        ticks: i32,
    },
    /// Dial pressed: toggles mute
    Press { action: Arc<dyn DialSurface> },
    /// Audio backend changed volume on its own
    VolumeChanged { volume: f64, muted: bool },
    /// Action left the display
    WillDisappear,
}

impl fmt::Debug for DialEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialEvent::WillAppear { action, settings } => f
                .debug_struct("WillAppear")
                .field("action", &action.id())
                .field("settings", settings)
                .finish(),
            DialEvent::DidReceiveSettings { settings } => f
                .debug_struct("DidReceiveSettings")
                .field("settings", settings)
                .finish(),
            DialEvent::Rotate { action, ticks } => f
                .debug_struct("Rotate")
                .field("action", &action.id())
                .field("ticks", ticks)
                .finish(),
            DialEvent::Press { action } => {
                f.debug_struct("Press").field("action", &action.id()).finish()
            }
            DialEvent::VolumeChanged { volume, muted } => f
                .debug_struct("VolumeChanged")
                .field("volume", volume)
                .field("muted", muted)
                .finish(),
            DialEvent::WillDisappear => f.write_str("WillDisappear"),
        }
    }
}

/// The controller task has exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Dial controller is no longer running")]
pub struct DialClosed;

/// Cloneable sender side of a running dial controller
#[derive(Clone, Debug)]
pub struct DialHandle {
    sender: mpsc::Sender<DialEvent>,
}

impl DialHandle {
    pub(crate) fn new(sender: mpsc::Sender<DialEvent>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: DialEvent) -> Result<(), DialClosed> {
        self.sender.send(event).await.map_err(|_| DialClosed)
    }

    pub async fn will_appear(
        &self,
        action: Arc<dyn DialSurface>,
        settings: DialSettings,
    ) -> Result<(), DialClosed> {
        self.send(DialEvent::WillAppear { action, settings }).await
    }

    pub async fn settings_changed(&self, settings: DialSettings) -> Result<(), DialClosed> {
        self.send(DialEvent::DidReceiveSettings { settings }).await
    }

    pub async fn rotate(&self, action: Arc<dyn DialSurface>, ticks: i32) -> Result<(), DialClosed> {
        self.send(DialEvent::Rotate { action, ticks }).await
    }

    pub async fn press(&self, action: Arc<dyn DialSurface>) -> Result<(), DialClosed> {
        self.send(DialEvent::Press { action }).await
    }

    /// Notify the dial of an external volume change
    pub async fn volume_changed(&self, volume: f64, muted: bool) -> Result<(), DialClosed> {
        self.send(DialEvent::VolumeChanged { volume, muted }).await
    }

    pub async fn will_disappear(&self) -> Result<(), DialClosed> {
        self.send(DialEvent::WillDisappear).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
