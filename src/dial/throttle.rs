//! Render rate limiting

use std::time::Duration;

use tokio::time::Instant;

/// Default minimum gap between throttled renders (<= 25 fps)
pub const DEFAULT_MIN_RENDER_INTERVAL: Duration = Duration::from_millis(40);

/// Admits at most one render per `min_interval`
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    last_render_at: Option<Instant>,
    min_interval: Duration,
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RENDER_INTERVAL)
    }
}

impl RenderThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_render_at: None,
            min_interval,
        }
    }

    /// Admit a render at `now`, stamping it on success
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_render_at {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_render_at = Some(now);
        true
    }

    /// Earliest instant the next render would be admitted
    pub fn next_allowed(&self) -> Option<Instant> {
        self.last_render_at.map(|last| last + self.min_interval)
    }
}
