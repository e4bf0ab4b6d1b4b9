use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_falloff() -> f32 {
    0.9
}
const fn default_min_angle() -> f32 {
    1.0e-4
}
const fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// SolverSettings
// ---------------------------------------------------------------------------

/// Global knobs for the per-frame constraint pass.
///
/// Chain-specific parameters (iteration count, per-step angle clamp) live on
/// each [`IkChain`] descriptor; these settings apply to every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
pub struct SolverSettings {
    /// Per-link decay applied to the rotation power within one CCD iteration
    /// (default: 0.9). Must be in (0, 1].
    #[serde(default = "default_falloff")]
    pub falloff: f32,

    /// Rotation angles below this are treated as already aligned and the
    /// link is skipped for the iteration (default: 1e-4 rad). Must be > 0.
    #[serde(default = "default_min_angle")]
    pub min_angle: f32,

    /// Master toggle for the whole constraint pass (default: true).
    /// Disabled rigs keep whatever pose the animation layer wrote.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            falloff: default_falloff(),
            min_angle: default_min_angle(),
            enabled: true,
        }
    }
}

impl SolverSettings {
    /// Load and validate settings from a TOML file.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse settings from a TOML string and validate them.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.falloff > 0.0 && self.falloff <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "falloff".into(),
                message: format!("must be in (0, 1], got {}", self.falloff),
            });
        }
        if !(self.min_angle > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "min_angle".into(),
                message: format!("must be > 0, got {}", self.min_angle),
            });
        }
        Ok(())
    }
}
