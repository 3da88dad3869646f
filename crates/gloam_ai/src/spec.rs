//! Authoring format for behavior specs.
//!
//! This is the loosely-typed JSON shape spec authors write. It is only an
//! intermediate form: [`FsmCompiler`](crate::FsmCompiler) validates it and
//! turns every entry into typed actions and transition rules.
//!
//! ```json
//! {
//!   "initial": "idle",
//!   "states": {
//!     "idle":   { "on_enter": [{"set_animation": "idle"}], "while": ["stop_x"] },
//!     "follow": { "while": ["move_towards_player"] }
//!   },
//!   "transitions": {
//!     "idle":   [{"see_player": "follow"}],
//!     "follow": {"lost_player": "idle"}
//!   }
//! }
//! ```

use crate::error::SpecError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StateSpec {
    pub on_enter: Vec<Value>,
    #[serde(rename = "while")]
    pub while_: Vec<Value>,
    pub on_exit: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PhaseSpec {
    pub name: String,
    pub start_when: Vec<Value>,
    /// Per-source-state overrides, same forms as [`FsmSpec::transitions`].
    pub transitions: BTreeMap<String, Value>,
    pub reset_state: bool,
    pub on_enter: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FsmSpec {
    pub initial: Option<String>,
    pub states: BTreeMap<String, StateSpec>,
    /// Either `[{"event": "target"}, ..]` or `{"event": "target", ..}`.
    pub transitions: BTreeMap<String, Value>,
    pub phases: Vec<PhaseSpec>,
}

impl FsmSpec {
    pub fn from_value(raw: &Value) -> Result<Self, SpecError> {
        Ok(Self::deserialize(raw)?)
    }

    pub fn from_json(text: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Normalize either transition form into ordered `(event, target)` pairs.
///
/// The list form keeps authored order; the map form is ordered by event
/// name. A repeated event keeps its first position and takes the last target.
pub fn normalize_transitions(state: &str, raw: &Value) -> Result<Vec<(String, String)>, SpecError> {
    let malformed = |reason: String| SpecError::MalformedTransitions {
        state: state.to_string(),
        reason,
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut push = |event: &str, target: &Value| -> Result<(), SpecError> {
        let target = target
            .as_str()
            .ok_or_else(|| malformed(format!("target for '{event}' must be a state name")))?;
        match pairs.iter_mut().find(|(e, _)| e == event) {
            Some(existing) => existing.1 = target.to_string(),
            None => pairs.push((event.to_string(), target.to_string())),
        }
        Ok(())
    };

    match raw {
        Value::Object(map) => {
            for (event, target) in map {
                push(event, target)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                let Value::Object(map) = item else {
                    return Err(malformed(format!("expected a map entry, found {item}")));
                };
                for (event, target) in map {
                    push(event, target)?;
                }
            }
        }
        Value::Null => {}
        other => return Err(malformed(format!("expected a list or map, found {other}"))),
    }
    Ok(pairs)
}
