//! Domain state for one dial: target volume and mute flag

/// Volume state for a single dial instance.
///
/// `target_volume` stays within 0..=100. Muting never touches it, so un-muting
/// restores the previous volume exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeState {
    target_volume: u8,
    muted: bool,
}

impl VolumeState {
    pub fn new(initial_volume: u8) -> Self {
        Self {
            target_volume: initial_volume.min(100),
            muted: false,
        }
    }

    pub fn target_volume(&self) -> u8 {
        self.target_volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Value the smoother should be heading to
    pub fn smoother_target(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            f64::from(self.target_volume)
        }
    }

    /// Apply `ticks` detents of `step` each. Any rotation that leaves a
    /// non-zero target clears mute.
    pub fn rotate(&mut self, ticks: i32, step: u32) {
        let next = (i64::from(self.target_volume) + i64::from(ticks) * i64::from(step)).clamp(0, 100);
        self.target_volume = next as u8;

        if self.muted && self.target_volume > 0 {
            self.muted = false;
        }
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Adopt a volume reported by the audio backend.
    ///
    /// Non-finite volumes leave the target untouched; the mute flag always applies.
    pub fn apply_backend(&mut self, volume: f64, muted: bool) {
        if volume.is_finite() {
            self.target_volume = volume.clamp(0.0, 100.0).round() as u8;
        }
        self.muted = muted;
    }
}
