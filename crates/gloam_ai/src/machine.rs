// machine.rs - Per-entity, per-tick state machine step
//
// Order within one tick:
//   1. enter `initial` if no state is active yet
//   2. run the current state's `while` actions
//   3. queue = incoming events, then events raised by `while`, then events
//      of checkers that hold for the current state
//   4. process the queue in order; each event resolves against whatever
//      state is current at that point
// Events raised by `on_exit`/`on_enter` during the tick are handed back as
// `deferred` and belong to the next tick.

use crate::action::Action;
use crate::components::{EventId, StateId};
use crate::context::AiActionContext;
use crate::fsm::{FsmDef, TransitionTable};

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// `None` for the initial entry.
    pub from: Option<StateId>,
    pub to: StateId,
    /// `None` when entered without an event (initial entry).
    pub event: Option<EventId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub transitions: Vec<Transition>,
    pub deferred: Vec<EventId>,
}

pub fn run_actions(actions: &[Action], ctx: &mut AiActionContext<'_>, dt: f32) {
    for action in actions {
        action.run(ctx, dt);
    }
}

/// Advance one entity's FSM by one tick against `table`, which is the base
/// table or a phase-merged copy of it.
pub fn tick(
    def: &FsmDef,
    table: &TransitionTable,
    ctx: &mut AiActionContext<'_>,
    incoming: Vec<EventId>,
    dt: f32,
) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    if ctx.state.current.is_none() {
        ctx.state.current = Some(def.initial.clone());
        if let Some(state) = def.state(&def.initial) {
            run_actions(&state.on_enter, ctx, dt);
        }
        outcome.transitions.push(Transition {
            from: None,
            to: def.initial.clone(),
            event: None,
        });
        outcome.deferred.extend(ctx.take_events());
    }

    let Some(current) = ctx.state.current.clone() else {
        return outcome;
    };
    if let Some(state) = def.state(&current) {
        run_actions(&state.while_, ctx, dt);
    }

    let mut queue = incoming;
    queue.extend(ctx.take_events());
    let facts = ctx.facts();
    queue.extend(
        table
            .rules(&current)
            .iter()
            .filter(|rule| rule.checker.as_ref().is_some_and(|c| c.check(&facts)))
            .map(|rule| rule.event.clone()),
    );

    for event in queue {
        let Some(current) = ctx.state.current.clone() else {
            break;
        };
        let Some(target) = table.target(&current, &event) else {
            continue;
        };
        if target == current {
            continue;
        }
        let Some(next) = def.state(target) else {
            tracing::trace!(entity = %ctx.entity, %event, to = target, "transition to undeclared state ignored");
            continue;
        };

        if let Some(state) = def.state(&current) {
            run_actions(&state.on_exit, ctx, dt);
        }
        ctx.state.current = Some(target.to_string());
        run_actions(&next.on_enter, ctx, dt);

        outcome.transitions.push(Transition {
            from: Some(current),
            to: target.to_string(),
            event: Some(event),
        });
    }

    outcome.deferred.extend(ctx.take_events());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Fixture;
    use crate::fsm::FsmCompiler;
    use serde_json::json;

    fn compile(raw: serde_json::Value) -> FsmDef {
        FsmCompiler::default().compile(&raw).unwrap()
    }

    fn events(names: &[&str]) -> Vec<EventId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_tick_enters_initial_state() {
        let def = compile(json!({
            "initial": "idle",
            "states": {"idle": {"on_enter": [{"set_animation": "idle"}]}}
        }));
        let mut fx = Fixture::default();
        let outcome = tick(&def, &def.transitions, &mut fx.ctx(), vec![], 0.016);

        assert_eq!(fx.state.current.as_deref(), Some("idle"));
        assert_eq!(fx.host.animation.as_deref(), Some("idle"));
        assert_eq!(outcome.transitions.len(), 1);
        assert_eq!(outcome.transitions[0].from, None);
    }

    #[test]
    fn events_resolve_against_the_state_current_at_that_point() {
        let def = compile(json!({
            "initial": "a",
            "states": {"a": {}, "b": {}, "c": {}},
            "transitions": {"a": {"go": "b"}, "b": {"go": "c"}}
        }));
        let mut fx = Fixture::default();
        tick(&def, &def.transitions, &mut fx.ctx(), vec![], 0.016);
        let outcome = tick(&def, &def.transitions, &mut fx.ctx(), events(&["go", "go"]), 0.016);

        assert_eq!(fx.state.current.as_deref(), Some("c"));
        assert_eq!(outcome.transitions.len(), 2);
    }

    #[test]
    fn self_and_undeclared_targets_do_not_transition() {
        let def = compile(json!({
            "initial": "a",
            "states": {"a": {"on_exit": [{"emit_event": "left"}]}},
            "transitions": {"a": {"stay": "a", "vanish": "ghost"}}
        }));
        let mut fx = Fixture::default();
        tick(&def, &def.transitions, &mut fx.ctx(), vec![], 0.016);
        let outcome = tick(&def, &def.transitions, &mut fx.ctx(), events(&["stay", "vanish"]), 0.016);

        assert_eq!(fx.state.current.as_deref(), Some("a"));
        assert!(outcome.transitions.is_empty());
        assert!(outcome.deferred.is_empty());
    }

    #[test]
    fn exit_and_enter_events_are_deferred() {
        let def = compile(json!({
            "initial": "a",
            "states": {
                "a": {"on_exit": [{"emit_event": "from_a"}]},
                "b": {"on_enter": [{"emit_event": "into_b"}]},
                "c": {}
            },
            "transitions": {"a": {"go": "b"}, "b": {"into_b": "c"}}
        }));
        let mut fx = Fixture::default();
        tick(&def, &def.transitions, &mut fx.ctx(), vec![], 0.016);
        let outcome = tick(&def, &def.transitions, &mut fx.ctx(), events(&["go"]), 0.016);

        assert_eq!(fx.state.current.as_deref(), Some("b"));
        assert_eq!(outcome.deferred, events(&["from_a", "into_b"]));

        tick(&def, &def.transitions, &mut fx.ctx(), outcome.deferred, 0.016);
        assert_eq!(fx.state.current.as_deref(), Some("c"));
    }

    #[test]
    fn while_events_are_processed_in_the_same_tick() {
        let def = compile(json!({
            "initial": "a",
            "states": {"a": {"while": [{"emit_event": "next"}]}, "b": {}},
            "transitions": {"a": {"next": "b"}}
        }));
        let mut fx = Fixture::default();
        tick(&def, &def.transitions, &mut fx.ctx(), vec![], 0.016);
        assert_eq!(fx.state.current.as_deref(), Some("b"));
    }
}
