//! Gloam Services Layer
//!
//! Host-facing configuration for the runtime binary.

pub mod settings;

pub use settings::{
    LoggingSettings, NavigationSettings, ScriptingSettings, Settings, SettingsError,
    SimulationSettings,
};
