//! Interpreter abstraction.
//!
//! The driver only talks to [`ScriptEngine`] and [`ScriptInstance`], so the
//! embedded interpreter can be swapped, or left out entirely with
//! [`NullScriptEngine`].

use crate::bridge::HostBridge;
use crate::error::ScriptError;
use std::rc::Rc;

/// One lifecycle callback, named after the script function it calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecyclePhase<'a> {
    /// `enter(state)`
    Enter(&'a str),
    /// `update(state, dt)`
    Update(&'a str, f32),
    /// `exit(state)`
    Exit(&'a str),
}

impl LifecyclePhase<'_> {
    pub fn function_name(&self) -> &'static str {
        match self {
            LifecyclePhase::Enter(_) => "enter",
            LifecyclePhase::Update(..) => "update",
            LifecyclePhase::Exit(_) => "exit",
        }
    }

    pub fn state(&self) -> &str {
        match self {
            LifecyclePhase::Enter(state) | LifecyclePhase::Update(state, _) | LifecyclePhase::Exit(state) => {
                state
            }
        }
    }
}

pub trait ScriptEngine {
    fn name(&self) -> &'static str;

    /// Load `source` into a fresh interpreter wired to `host`.
    fn compile(
        &self,
        path: &str,
        source: &str,
        host: Rc<HostBridge>,
    ) -> Result<Box<dyn ScriptInstance>, ScriptError>;
}

/// A loaded script with its own interpreter state.
pub trait ScriptInstance {
    /// Call the phase's function. A script that does not define it is fine.
    fn run_phase(&self, phase: LifecyclePhase<'_>) -> Result<(), ScriptError>;

    /// Read a string global, `None` when it is undefined or null.
    fn get_global(&self, name: &str) -> Result<Option<String>, ScriptError>;
}

/// Engine used when scripting is disabled. Every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptEngine;

impl ScriptEngine for NullScriptEngine {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn compile(
        &self,
        path: &str,
        _source: &str,
        _host: Rc<HostBridge>,
    ) -> Result<Box<dyn ScriptInstance>, ScriptError> {
        Err(ScriptError::Disabled {
            path: path.to_string(),
        })
    }
}

/// The interpreter compiled into this build.
pub fn default_engine() -> Box<dyn ScriptEngine> {
    #[cfg(feature = "quickjs")]
    {
        Box::new(crate::quickjs::QuickJsEngine)
    }
    #[cfg(not(feature = "quickjs"))]
    {
        Box::new(NullScriptEngine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gloam_ai::{ActionRegistry, CheckerRegistry};

    #[test]
    fn null_engine_rejects_every_script() {
        let host = Rc::new(HostBridge::new(ActionRegistry::new(), CheckerRegistry::new()));
        let err = NullScriptEngine.compile("boss.js", "", host).err();
        assert!(matches!(err, Some(ScriptError::Disabled { path }) if path == "boss.js"));
    }

    #[test]
    fn phases_name_their_functions() {
        assert_eq!(LifecyclePhase::Update("idle", 0.1).function_name(), "update");
        assert_eq!(LifecyclePhase::Exit("idle").state(), "idle");
    }
}
