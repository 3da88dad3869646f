// phase.rs - One-way phase overlays on top of a compiled FSM
//
// Phases are authored in order. The first tick activates the first phase
// whose conditions all hold; later ticks only look forward from the active
// phase and may activate several consecutive phases at once. A phase never
// deactivates. Activation swaps in `base transitions + overrides`, may clear
// the current state so the FSM re-enters `initial`, and runs `on_enter`.

use crate::action::{split_entry, Action};
use crate::context::AiActionContext;
use crate::error::SpecError;
use crate::fsm::{FsmDef, TransitionTable};
use crate::machine::run_actions;
use serde_json::Value;
use std::rc::Rc;

/// A single `start_when` predicate. A phase starts when all of them hold.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseCondition {
    Always,
    /// Current hit points at or below the value.
    HpLte(f32),
    HpGte(f32),
    PlayerInRange(f32),
    /// Also true when there is no player.
    PlayerOutOfRange(f32),
    StateIs(String),
}

impl PhaseCondition {
    pub fn decode(phase: &str, entry: &Value) -> Result<Self, SpecError> {
        let (name, arg) = split_entry(entry).map_err(|_| SpecError::InvalidPhaseCondition {
            phase: phase.to_string(),
            name: entry.to_string(),
            expected: "a condition name or single-key map",
        })?;
        let invalid = |expected: &'static str| SpecError::InvalidPhaseCondition {
            phase: phase.to_string(),
            name: name.to_string(),
            expected,
        };
        let number = || {
            arg.and_then(Value::as_f64)
                .map(|n| n as f32)
                .ok_or_else(|| invalid("a number"))
        };

        match name {
            "always" => Ok(PhaseCondition::Always),
            "hp_lte" => number().map(PhaseCondition::HpLte),
            "hp_gte" => number().map(PhaseCondition::HpGte),
            "player_in_range" => number().map(PhaseCondition::PlayerInRange),
            "player_out_of_range" => number().map(PhaseCondition::PlayerOutOfRange),
            "state_is" => arg
                .and_then(Value::as_str)
                .map(|s| PhaseCondition::StateIs(s.to_string()))
                .ok_or_else(|| invalid("a state name")),
            _ => Err(SpecError::UnknownPhaseCondition {
                phase: phase.to_string(),
                name: name.to_string(),
            }),
        }
    }

    pub fn holds(&self, facts: &PhaseFacts<'_>) -> bool {
        match self {
            PhaseCondition::Always => true,
            PhaseCondition::HpLte(v) => facts.hp.is_some_and(|hp| hp <= *v),
            PhaseCondition::HpGte(v) => facts.hp.is_some_and(|hp| hp >= *v),
            PhaseCondition::PlayerInRange(r) => facts.player_distance.is_some_and(|d| d <= *r),
            PhaseCondition::PlayerOutOfRange(r) => facts.player_distance.map_or(true, |d| d > *r),
            PhaseCondition::StateIs(state) => facts.state == Some(state.as_str()),
        }
    }
}

/// Inputs phase conditions are evaluated against.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseFacts<'a> {
    pub hp: Option<f32>,
    pub player_distance: Option<f32>,
    pub state: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct PhaseDef {
    pub name: String,
    pub start_when: Vec<PhaseCondition>,
    pub overrides: TransitionTable,
    pub reset_state: bool,
    pub on_enter: Vec<Action>,
}

impl PhaseDef {
    /// Logical AND over `start_when`; an empty list is satisfied.
    pub fn is_satisfied(&self, facts: &PhaseFacts<'_>) -> bool {
        self.start_when.iter().all(|c| c.holds(facts))
    }
}

/// Per-entity phase progress.
#[derive(Debug, Clone, Default)]
pub struct AiPhaseRuntime {
    pub current_phase: Option<usize>,
    pub initialized: bool,
    /// Base table merged with the active phase's overrides.
    pub active_transitions: Option<Rc<TransitionTable>>,
}

impl AiPhaseRuntime {
    /// The table the FSM should use this tick.
    pub fn transitions<'a>(&'a self, def: &'a FsmDef) -> &'a TransitionTable {
        self.active_transitions.as_deref().unwrap_or(&def.transitions)
    }
}

/// Drives phase activation for one compiled definition.
#[derive(Debug, Clone)]
pub struct AiPhaseController {
    def: Rc<FsmDef>,
}

impl AiPhaseController {
    pub fn new(def: Rc<FsmDef>) -> Self {
        Self { def }
    }

    pub fn phases(&self) -> &[PhaseDef] {
        &self.def.phases
    }

    /// Decide which phases activate this tick and move `runtime` forward.
    /// Returns the activated indices in order.
    pub fn advance(&self, runtime: &mut AiPhaseRuntime, facts: &PhaseFacts<'_>) -> Vec<usize> {
        let phases = self.phases();
        let mut activated = Vec::new();

        // Until some phase activates, any phase in the list may be first.
        if !runtime.initialized {
            if let Some(index) = phases.iter().position(|p| p.is_satisfied(facts)) {
                runtime.initialized = true;
                runtime.current_phase = Some(index);
                activated.push(index);
            }
            return activated;
        }

        let mut next = runtime.current_phase.map_or(0, |i| i + 1);
        while next < phases.len() && phases[next].is_satisfied(facts) {
            runtime.current_phase = Some(next);
            activated.push(next);
            next += 1;
        }
        activated
    }

    /// Advance and apply every activation: swap the active table, reset the
    /// FSM state when asked, and run `on_enter`.
    pub fn update(
        &self,
        runtime: &mut AiPhaseRuntime,
        hp: Option<f32>,
        ctx: &mut AiActionContext<'_>,
        dt: f32,
    ) -> Vec<usize> {
        if self.phases().is_empty() {
            return Vec::new();
        }
        let facts = PhaseFacts {
            hp,
            player_distance: ctx.player_distance(),
            state: ctx.current_state(),
        };
        let activated = self.advance(runtime, &facts);

        for &index in &activated {
            let phase = &self.def.phases[index];
            runtime.active_transitions = Some(Rc::new(self.def.transitions.merged(&phase.overrides)));
            if phase.reset_state {
                ctx.state.current = None;
            }
            run_actions(&phase.on_enter, ctx, dt);
            tracing::debug!(
                entity = %ctx.entity,
                phase = %phase.name,
                index,
                reset = phase.reset_state,
                "phase activated"
            );
        }
        activated
    }
}
