use std::path::PathBuf;
use thiserror::Error;

/// Failures loading or running a behavior script.
///
/// None of these are fatal: the driver logs them and leaves the entity's
/// state untouched for that tick.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile script {path}: {message}")]
    Compile { path: String, message: String },

    #[error("script failed in {phase}: {message}")]
    Runtime { phase: String, message: String },

    #[error("scripting is disabled; cannot load {path}")]
    Disabled { path: String },
}

impl ScriptError {
    pub fn runtime(phase: &str, message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            phase: phase.to_string(),
            message: message.into(),
        }
    }
}
