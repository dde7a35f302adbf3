//! Configuration types for recording playback.

use serde::{Deserialize, Serialize};

fn default_hidden_name_prefix() -> String {
    "Large Grid".to_string()
}

/// Top-level replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Minimum elapsed playback time between tail reads, in seconds.
    pub poll_interval_secs: f32,
    /// Selectable playback speeds, fastest first.
    pub speed_presets: Vec<SpeedPreset>,
    /// Index into `speed_presets` used when a recording is opened.
    pub default_speed: usize,
    /// Wrap to the start when playback reaches the end.
    #[serde(default)]
    pub looping: bool,
    /// RGB colour for entities of the `Unowned` faction.
    pub neutral_color: [f32; 3],
    /// Entities whose name starts with this prefix are hidden in the entity list.
    #[serde(default = "default_hidden_name_prefix")]
    pub hidden_name_prefix: String,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 0.05,
            speed_presets: SpeedPreset::defaults(),
            default_speed: 2,
            looping: false,
            neutral_color: [0.6, 0.6, 0.6],
            hidden_name_prefix: default_hidden_name_prefix(),
        }
    }
}

/// One entry of the playback speed selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedPreset {
    /// Label shown to the user.
    pub name: String,
    /// Frames advanced per second of wall time.
    pub multiplier: f32,
}

impl SpeedPreset {
    pub fn new(name: &str, multiplier: f32) -> Self {
        Self {
            name: name.to_string(),
            multiplier,
        }
    }

    pub fn defaults() -> Vec<SpeedPreset> {
        vec![
            SpeedPreset::new("Very Fast", 10.0),
            SpeedPreset::new("Fast", 4.0),
            SpeedPreset::new("Realtime", 1.1),
            SpeedPreset::new("Slow", 0.5),
        ]
    }
}

impl ReplayConfig {
    /// Multiplier of the default speed preset.
    pub fn default_multiplier(&self) -> f32 {
        self.speed_presets
            .get(self.default_speed)
            .map(|p| p.multiplier)
            .unwrap_or(1.0)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.poll_interval_secs > 0.0) {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.speed_presets.is_empty() {
            return Err(ConfigError::NoSpeedPresets);
        }
        for (i, preset) in self.speed_presets.iter().enumerate() {
            if !(preset.multiplier > 0.0) {
                return Err(ConfigError::InvalidSpeed {
                    preset: i,
                    multiplier: preset.multiplier,
                });
            }
        }
        if self.default_speed >= self.speed_presets.len() {
            return Err(ConfigError::InvalidDefaultSpeed {
                index: self.default_speed,
                count: self.speed_presets.len(),
            });
        }
        if self
            .neutral_color
            .iter()
            .any(|c| !(0.0..=1.0).contains(c))
        {
            return Err(ConfigError::InvalidColor);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Poll interval must be positive")]
    InvalidPollInterval,
    #[error("At least one speed preset is required")]
    NoSpeedPresets,
    #[error("Speed preset {preset} has non-positive multiplier {multiplier}")]
    InvalidSpeed { preset: usize, multiplier: f32 },
    #[error("Default speed {index} out of range ({count} presets)")]
    InvalidDefaultSpeed { index: usize, count: usize },
    #[error("Neutral colour components must be within [0, 1]")]
    InvalidColor,
}
