// fsm.rs - Compiled state machine definitions and the spec compiler
//
// `FsmCompiler` resolves every action and checker name at load time. The
// resulting `FsmDef` holds only typed actions, so a loaded spec can never
// fail while ticking.

use crate::action::{split_entry, Action, ActionRegistry};
use crate::checker::{Checker, CheckerRegistry};
use crate::components::{EventId, StateId};
use crate::error::SpecError;
use crate::phase::{PhaseCondition, PhaseDef};
use crate::spec::{normalize_transitions, FsmSpec, PhaseSpec};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Action lists for one state.
#[derive(Debug, Clone, Default)]
pub struct StateDef {
    pub on_enter: Vec<Action>,
    pub while_: Vec<Action>,
    pub on_exit: Vec<Action>,
}

/// One `(event -> target)` row, with the checker bound to the event name.
#[derive(Debug, Clone)]
pub struct TransitionRule {
    pub event: EventId,
    pub target: StateId,
    pub checker: Option<Checker>,
}

/// `source state -> ordered rules`.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    rows: BTreeMap<StateId, Vec<TransitionRule>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<StateId>, rules: Vec<TransitionRule>) {
        self.rows.insert(source.into(), rules);
    }

    /// Rules for `source`, in authored order.
    pub fn rules(&self, source: &str) -> &[TransitionRule] {
        self.rows.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn target(&self, source: &str, event: &str) -> Option<&str> {
        self.rules(source)
            .iter()
            .find(|rule| rule.event == event)
            .map(|rule| rule.target.as_str())
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Deep copy with `overrides` on top. An override row replaces the base
    /// row for the same source state.
    pub fn merged(&self, overrides: &TransitionTable) -> TransitionTable {
        let mut rows = self.rows.clone();
        for (source, rules) in &overrides.rows {
            rows.insert(source.clone(), rules.clone());
        }
        TransitionTable { rows }
    }
}

/// Executable state machine shared by every entity using the same spec.
#[derive(Debug, Clone)]
pub struct FsmDef {
    pub initial: StateId,
    pub states: HashMap<StateId, StateDef>,
    pub transitions: TransitionTable,
    pub phases: Vec<PhaseDef>,
}

impl FsmDef {
    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }
}

fn warn_missing_targets(
    table: &TransitionTable,
    states: &HashMap<StateId, StateDef>,
    phase: Option<&str>,
) {
    for source in table.sources() {
        if phase.is_some() && !states.contains_key(source) {
            tracing::warn!(phase, source, "phase override for an undeclared state");
        }
        for rule in table.rules(source) {
            if !states.contains_key(&rule.target) {
                tracing::warn!(
                    phase,
                    source,
                    event = %rule.event,
                    to = %rule.target,
                    "transition target is not a declared state"
                );
            }
        }
    }
}

/// Turns authored specs into [`FsmDef`]s against injected registries.
#[derive(Debug, Clone)]
pub struct FsmCompiler {
    actions: ActionRegistry,
    checkers: CheckerRegistry,
}

impl Default for FsmCompiler {
    fn default() -> Self {
        Self::new(ActionRegistry::with_builtins(), CheckerRegistry::with_builtins())
    }
}

impl FsmCompiler {
    pub fn new(actions: ActionRegistry, checkers: CheckerRegistry) -> Self {
        Self { actions, checkers }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn checkers(&self) -> &CheckerRegistry {
        &self.checkers
    }

    pub fn compile_str(&self, text: &str) -> Result<FsmDef, SpecError> {
        self.compile_spec(&FsmSpec::from_json(text)?)
    }

    /// Compile a raw JSON value.
    pub fn compile(&self, raw: &Value) -> Result<FsmDef, SpecError> {
        self.compile_spec(&FsmSpec::from_value(raw)?)
    }

    pub fn compile_spec(&self, spec: &FsmSpec) -> Result<FsmDef, SpecError> {
        let initial = spec
            .initial
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or(SpecError::MissingInitialState)?;
        if !spec.states.contains_key(&initial) {
            return Err(SpecError::UnknownInitialState { initial });
        }

        let mut states = HashMap::with_capacity(spec.states.len());
        for (name, state) in &spec.states {
            let def = StateDef {
                on_enter: self.compile_actions(name, &state.on_enter)?,
                while_: self.compile_actions(name, &state.while_)?,
                on_exit: self.compile_actions(name, &state.on_exit)?,
            };
            states.insert(name.clone(), def);
        }

        let transitions = self.compile_transitions(&spec.transitions)?;
        warn_missing_targets(&transitions, &states, None);

        let phases = self.compile_phases(&spec.phases)?;
        for phase in &phases {
            warn_missing_targets(&phase.overrides, &states, Some(&phase.name));
        }
        tracing::debug!(
            initial = %initial,
            states = states.len(),
            phases = phases.len(),
            "compiled behavior spec"
        );

        Ok(FsmDef {
            initial,
            states,
            transitions,
            phases,
        })
    }

    pub fn compile_actions(&self, state: &str, entries: &[Value]) -> Result<Vec<Action>, SpecError> {
        entries
            .iter()
            .map(|entry| {
                let (name, arg) = split_entry(entry).map_err(|reason| SpecError::MalformedAction {
                    state: state.to_string(),
                    reason,
                })?;
                self.actions
                    .decode(name, arg)
                    .map_err(|err| SpecError::from_action(state, err))
            })
            .collect()
    }

    pub fn compile_transitions(
        &self,
        raw: &BTreeMap<String, Value>,
    ) -> Result<TransitionTable, SpecError> {
        let mut table = TransitionTable::new();
        for (source, value) in raw {
            let rules = normalize_transitions(source, value)?
                .into_iter()
                .map(|(event, target)| TransitionRule {
                    checker: self.checkers.get(&event).cloned(),
                    event,
                    target,
                })
                .collect();
            table.insert(source.clone(), rules);
        }
        Ok(table)
    }

    pub fn compile_phases(&self, phases: &[PhaseSpec]) -> Result<Vec<PhaseDef>, SpecError> {
        phases
            .iter()
            .enumerate()
            .map(|(index, phase)| {
                let name = if phase.name.is_empty() {
                    format!("phase_{index}")
                } else {
                    phase.name.clone()
                };
                let start_when = phase
                    .start_when
                    .iter()
                    .map(|entry| PhaseCondition::decode(&name, entry))
                    .collect::<Result<Vec<_>, _>>()?;
                let overrides = self.compile_transitions(&phase.transitions)?;
                let on_enter = self.compile_actions(&name, &phase.on_enter)?;
                Ok(PhaseDef {
                    name,
                    start_when,
                    overrides,
                    reset_state: phase.reset_state,
                    on_enter,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> Value {
        json!({
            "initial": "idle",
            "states": {
                "idle": {"on_enter": [{"set_animation": "idle"}], "while": ["stop_x"]},
                "follow": {"while": [{"move_towards_player": 50}]},
                "attack": {"on_enter": [{"start_timer": 0.5}], "while": ["tick_timer"]}
            },
            "transitions": {
                "idle": [{"see_player": "follow"}],
                "follow": {"in_attack_range": "attack", "lost_player": "idle"},
                "attack": [{"timer_expired": "follow"}]
            }
        })
    }

    #[test]
    fn compiles_states_and_binds_checkers() {
        let def = FsmCompiler::default().compile(&spec()).unwrap();
        assert_eq!(def.initial, "idle");
        assert_eq!(def.states.len(), 3);
        assert_eq!(def.state("idle").unwrap().on_enter.len(), 1);
        assert_eq!(def.transitions.target("follow", "in_attack_range"), Some("attack"));

        let idle = def.transitions.rules("idle");
        assert_eq!(idle[0].checker.as_ref().map(Checker::name), Some("see_player"));
        let attack = def.transitions.rules("attack");
        assert!(attack[0].checker.is_none());
    }

    #[test]
    fn unknown_action_fails_at_load_time() {
        let mut raw = spec();
        raw["states"]["idle"]["while"] = json!(["moonwalk"]);
        let err = FsmCompiler::default().compile(&raw).unwrap_err();
        assert!(matches!(
            err,
            SpecError::UnknownAction { ref state, ref name } if state == "idle" && name == "moonwalk"
        ));
    }

    #[test]
    fn initial_state_must_be_present_and_declared() {
        let compiler = FsmCompiler::default();
        let mut raw = spec();
        raw.as_object_mut().unwrap().remove("initial");
        assert!(matches!(compiler.compile(&raw), Err(SpecError::MissingInitialState)));

        raw["initial"] = json!("sleep");
        assert!(matches!(
            compiler.compile(&raw),
            Err(SpecError::UnknownInitialState { .. })
        ));
    }

    #[test]
    fn missing_target_is_not_fatal() {
        let mut raw = spec();
        raw["transitions"]["idle"] = json!({"see_player": "nowhere"});
        let def = FsmCompiler::default().compile(&raw).unwrap();
        assert_eq!(def.transitions.target("idle", "see_player"), Some("nowhere"));
        assert!(!def.has_state("nowhere"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = FsmCompiler::default().compile_str("{ not json").unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)));
    }

    #[test]
    fn merged_replaces_rows_per_source_state() {
        let def = FsmCompiler::default().compile(&spec()).unwrap();
        let mut overrides = TransitionTable::new();
        overrides.insert(
            "follow",
            vec![TransitionRule {
                event: "enrage".into(),
                target: "attack".into(),
                checker: None,
            }],
        );

        let merged = def.transitions.merged(&overrides);
        assert_eq!(merged.target("follow", "enrage"), Some("attack"));
        assert_eq!(merged.target("follow", "lost_player"), None);
        assert_eq!(merged.target("idle", "see_player"), Some("follow"));
        assert_eq!(def.transitions.target("follow", "lost_player"), Some("idle"));
    }
}
