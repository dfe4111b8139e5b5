//! Per-action settings as persisted by the host
//!
//! All fields are optional; anything missing or out of range falls back to
//! the default with a warning. Unknown keys are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::smoother::{SmootherConfig, DEFAULT_SPEED, DEFAULT_TICK_INTERVAL};

pub const DEFAULT_STEP: u32 = 1;
pub const DEFAULT_RENDER_SIZE: u32 = 240;
/// Largest frame we are willing to rasterize
pub const MAX_RENDER_SIZE: u32 = 1024;

/// Settings payload (camelCase on the wire, snake_case accepted from config files)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(default, alias = "render_size", skip_serializing_if = "Option::is_none")]
    pub render_size: Option<i64>,
    #[serde(default, alias = "smoothing_speed", skip_serializing_if = "Option::is_none")]
    pub smoothing_speed: Option<f64>,
    #[serde(default, alias = "smoothing_tick_ms", skip_serializing_if = "Option::is_none")]
    pub smoothing_tick_ms: Option<i64>,
}

/// Settings after defaulting and range checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSettings {
    pub step: u32,
    pub render_size: u32,
    pub smoothing_speed: f64,
    pub smoothing_tick: Duration,
}

impl Default for ResolvedSettings {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            render_size: DEFAULT_RENDER_SIZE,
            smoothing_speed: DEFAULT_SPEED,
            smoothing_tick: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl ResolvedSettings {
    /// Smoother parameters seeded at `initial`
    pub fn smoother_config(&self, initial: f64) -> SmootherConfig {
        SmootherConfig {
            initial,
            speed: self.smoothing_speed,
            tick_interval: self.smoothing_tick,
        }
    }
}

impl DialSettings {
    /// Parse a host settings object. Anything unparseable yields all-defaults.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match serde_json::from_value(value.clone()) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed dial settings: {}", e);
                Self::default()
            }
        }
    }

    /// Apply defaults and range checks.
    ///
    /// Smoothing speed and tick are passed through untouched: the smoother is
    /// the one that rejects them.
    pub fn resolve(&self) -> ResolvedSettings {
        let defaults = ResolvedSettings::default();

        let step = match self.step {
            None => defaults.step,
            Some(v) if v >= 1 && v <= i64::from(u32::MAX) => v as u32,
            Some(v) => {
                tracing::warn!("Invalid step {}, using {}", v, defaults.step);
                defaults.step
            }
        };

        let render_size = match self.render_size {
            None => defaults.render_size,
            Some(v) if v >= 1 && v <= i64::from(MAX_RENDER_SIZE) => v as u32,
            Some(v) => {
                tracing::warn!("Invalid renderSize {}, using {}", v, defaults.render_size);
                defaults.render_size
            }
        };

        let smoothing_tick = match self.smoothing_tick_ms {
            None => defaults.smoothing_tick,
            Some(v) if v > 0 => Duration::from_millis(v as u64),
            Some(_) => Duration::ZERO,
        };

        ResolvedSettings {
            step,
            render_size,
            smoothing_speed: self.smoothing_speed.unwrap_or(defaults.smoothing_speed),
            smoothing_tick,
        }
    }

    /// Fill unset fields from `fallback`
    pub fn or(&self, fallback: &DialSettings) -> DialSettings {
        DialSettings {
            step: self.step.or(fallback.step),
            render_size: self.render_size.or(fallback.render_size),
            smoothing_speed: self.smoothing_speed.or(fallback.smoothing_speed),
            smoothing_tick_ms: self.smoothing_tick_ms.or(fallback.smoothing_tick_ms),
        }
    }
}
