//! Settings management
//!
//! Every field has a default, so a settings file only needs the values it
//! changes. A missing section falls back to its `Default`.

use gloam_core::math::{Aabb, Vec2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub simulation: SimulationSettings,
    pub navigation: NavigationSettings,
    pub scripting: ScriptingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub tick_rate_hz: u32,
    /// Ticks the headless runtime advances before exiting.
    pub ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    pub cell_size: f32,
    /// Seconds between path recomputations per agent.
    pub repath_interval: f32,
    pub bounds: BoundsSettings,
}

/// Level bounds as `[x, y]` corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsSettings {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl BoundsSettings {
    pub fn to_aabb(&self) -> Aabb {
        Aabb::new(Vec2::from(self.min), Vec2::from(self.max))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingSettings {
    pub enabled: bool,
    /// Directory script paths are resolved against.
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `"info,gloam_ai=debug"`.
    pub filter: String,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_rate_hz: gloam_core::time::TICK_RATE_HZ,
            ticks: 600,
        }
    }
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            repath_interval: 0.5,
            bounds: BoundsSettings {
                min: [0.0, 0.0],
                max: [640.0, 360.0],
            },
        }
    }
}

impl Default for ScriptingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("scripts"),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Read and parse a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }
}
