// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview settings.
//!
//! Stored as RON next to the project. Fields missing from the file fall back
//! to their defaults.

use crate::controller::PreviewMode;
use crate::cursor::DEFAULT_STEP_BIAS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Preview settings file name
pub const PREVIEW_SETTINGS_FILE_NAME: &str = "montage_preview.ron";

/// Errors raised while reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings applied when a montage preview starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Mode entered when a montage is loaded
    pub default_mode: PreviewMode,
    /// Whether preview chains loop
    pub looping: bool,
    /// Playback speed multiplier
    pub play_rate: f32,
    /// Frame bias used by single-frame stepping
    pub step_bias: f32,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            default_mode: PreviewMode::Normal,
            looping: true,
            play_rate: 1.0,
            step_bias: DEFAULT_STEP_BIAS,
        }
    }
}

impl PreviewSettings {
    /// Serialize to a pretty RON string
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = ron::from_str(source)?;
        if !(settings.play_rate.is_finite() && settings.play_rate > 0.0) {
            tracing::warn!("Ignoring invalid play rate {}", settings.play_rate);
            settings.play_rate = 1.0;
        }
        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron(&source)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
