//! Volume notification bus
//!
//! Uses tokio::sync::broadcast so any number of dials can follow the audio
//! backend. Notifications are snapshots: a lagging subscriber only needs the
//! newest one.

use std::sync::Arc;
use tokio::sync::broadcast;

/// Volume change reported by the audio backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeNotification {
    pub volume: f64,
    pub muted: bool,
}

/// Bus handle for publishing and subscribing
#[derive(Clone)]
pub struct VolumeBus {
    sender: broadcast::Sender<VolumeNotification>,
}

impl Default for VolumeBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl VolumeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all subscribers. Returns how many received it.
    pub fn publish(&self, volume: f64, muted: bool) -> usize {
        // Err only means nobody is listening yet
        self.sender
            .send(VolumeNotification { volume, muted })
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VolumeNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Shared bus wrapped in Arc
pub type SharedVolumeBus = Arc<VolumeBus>;

pub fn create_bus() -> SharedVolumeBus {
    Arc::new(VolumeBus::default())
}
