//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::dial::settings::DialSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dial: DialConfig,

    /// Where the simulator writes rendered frames
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dial: DialConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("frames")
}

/// Controller-level knobs that are not part of the per-action settings
#[derive(Debug, Clone, Deserialize)]
pub struct DialConfig {
    #[serde(default = "default_min_render_interval_ms")]
    pub min_render_interval_ms: u64,

    /// Volume assumed before the backend reports one
    #[serde(default = "default_initial_volume")]
    pub initial_volume: u8,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    #[serde(default = "default_step_queue_capacity")]
    pub step_queue_capacity: usize,

    /// Used for any field the host leaves unset
    #[serde(default)]
    pub defaults: DialSettings,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            min_render_interval_ms: default_min_render_interval_ms(),
            initial_volume: default_initial_volume(),
            event_queue_capacity: default_event_queue_capacity(),
            step_queue_capacity: default_step_queue_capacity(),
            defaults: DialSettings::default(),
        }
    }
}

impl DialConfig {
    pub fn min_render_interval(&self) -> Duration {
        Duration::from_millis(self.min_render_interval_ms)
    }
}

fn default_min_render_interval_ms() -> u64 {
    40
}

fn default_initial_volume() -> u8 {
    50
}

fn default_event_queue_capacity() -> usize {
    64
}

fn default_step_queue_capacity() -> usize {
    32
}

/// Get config directory (VOLDIAL_CONFIG_DIR or platform default)
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VOLDIAL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library/Application Support/volume-dial");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("volume-dial");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".config/volume-dial");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("volume-dial");
        }
    }

    // Fallback to current directory
    PathBuf::from(".")
}

pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir();

    let config = ::config::Config::builder()
        .set_default("output_dir", "frames")?
        // Load from config file if it exists (config.toml, config.json, ...)
        .add_source(
            ::config::File::with_name(&config_dir.join("config").to_string_lossy()).required(false),
        )
        // Override with environment variables (VOLDIAL_OUTPUT_DIR, VOLDIAL_DIAL__INITIAL_VOLUME, etc.)
        .add_source(
            ::config::Environment::with_prefix("VOLDIAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}
