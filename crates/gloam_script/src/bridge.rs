// bridge.rs - Host functions shared by every script engine
//
// Scripts never touch the world directly. Before each dispatch the driver
// snapshots the entity into a `ScriptFrame`; host functions read that
// snapshot and append commands. Commands are applied to the real context
// only after every lifecycle phase of the tick has succeeded.

use gloam_ai::{
    Action, ActionRegistry, AiActionContext, AiContext, AiTuning, CheckerFacts, CheckerRegistry,
    EventId, StateId,
};
use gloam_core::ecs::Entity;
use gloam_core::math::Vec2;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fmt::Write as _;

/// Deferred effect of a host call.
#[derive(Debug, Clone)]
pub enum ScriptCommand {
    Run(Action),
    Emit(EventId),
}

/// Per-dispatch snapshot plus the commands recorded so far.
#[derive(Debug, Default)]
pub struct ScriptFrame {
    pub entity: Option<Entity>,
    pub state: Option<StateId>,
    pub events: Vec<EventId>,
    pub position: Option<Vec2>,
    pub player: Option<Vec2>,
    pub context: AiContext,
    pub tuning: AiTuning,
    pub path_complete: bool,
    pub commands: Vec<ScriptCommand>,
    pub transition: Option<StateId>,
}

/// Host side of the script vocabulary, shared with the engine's callbacks.
#[derive(Debug)]
pub struct HostBridge {
    frame: RefCell<ScriptFrame>,
    actions: ActionRegistry,
    checkers: CheckerRegistry,
}

/// Names the prelude defines itself; registry entries never shadow them.
const RESERVED: &[&str] = &[
    "action",
    "check",
    "transition",
    "emit",
    "event",
    "consume_event",
    "get_position",
    "get_player_position",
    "current_state",
    "log",
    "enter",
    "update",
    "exit",
    "initial_state",
];

impl HostBridge {
    pub fn new(actions: ActionRegistry, checkers: CheckerRegistry) -> Self {
        Self {
            frame: RefCell::new(ScriptFrame::default()),
            actions,
            checkers,
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn checkers(&self) -> &CheckerRegistry {
        &self.checkers
    }

    /// Reset the frame from `ctx` and the events delivered this tick.
    pub fn begin(&self, ctx: &AiActionContext<'_>, events: Vec<EventId>) {
        let facts = ctx.facts();
        *self.frame.borrow_mut() = ScriptFrame {
            entity: Some(ctx.entity),
            state: ctx.state.current.clone(),
            events,
            position: facts.position,
            player: facts.player,
            context: facts.context.clone(),
            tuning: facts.tuning.clone(),
            path_complete: facts.path_complete,
            commands: Vec::new(),
            transition: None,
        };
    }

    pub fn set_state(&self, state: &str) {
        self.frame.borrow_mut().state = Some(state.to_string());
    }

    pub fn take_transition(&self) -> Option<StateId> {
        self.frame.borrow_mut().transition.take()
    }

    pub fn take_commands(&self) -> Vec<ScriptCommand> {
        std::mem::take(&mut self.frame.borrow_mut().commands)
    }

    /// Decode and queue a registered action. `arg_json` is the JSON text of
    /// the argument; `null` means none.
    pub fn action(&self, name: &str, arg_json: &str) -> Result<(), String> {
        let arg: Value = serde_json::from_str(arg_json)
            .map_err(|err| format!("argument for '{name}' is not valid JSON: {err}"))?;
        let arg = match &arg {
            Value::Null | Value::Bool(true) => None,
            other => Some(other),
        };
        let action = self.actions.decode(name, arg).map_err(|err| err.to_string())?;
        self.frame.borrow_mut().commands.push(ScriptCommand::Run(action));
        Ok(())
    }

    /// Evaluate a registered checker against the snapshot. Unknown names
    /// read as false.
    pub fn check(&self, name: &str) -> bool {
        let Some(checker) = self.checkers.get(name) else {
            return false;
        };
        let frame = self.frame.borrow();
        checker.check(&CheckerFacts {
            position: frame.position,
            player: frame.player,
            context: &frame.context,
            tuning: &frame.tuning,
            path_complete: frame.path_complete,
        })
    }

    /// Request a state change. The last request of a phase wins.
    pub fn transition(&self, target: &str) {
        self.frame.borrow_mut().transition = Some(target.to_string());
    }

    pub fn emit(&self, event: &str) {
        self.frame
            .borrow_mut()
            .commands
            .push(ScriptCommand::Emit(event.to_string()));
    }

    /// Whether `name` was delivered this tick and not consumed yet.
    pub fn has_event(&self, name: &str) -> bool {
        self.frame.borrow().events.iter().any(|e| e == name)
    }

    /// Remove one delivery of `name`. True if there was one.
    pub fn consume_event(&self, name: &str) -> bool {
        let mut frame = self.frame.borrow_mut();
        match frame.events.iter().position(|e| e == name) {
            Some(i) => {
                frame.events.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn position_json(&self) -> String {
        point_json(self.frame.borrow().position)
    }

    pub fn player_position_json(&self) -> String {
        point_json(self.frame.borrow().player)
    }

    pub fn current_state(&self) -> String {
        self.frame.borrow().state.clone().unwrap_or_default()
    }

    pub fn log(&self, message: &str) {
        let entity = self.frame.borrow().entity;
        match entity {
            Some(entity) => tracing::info!(target: "gloam_script::log", %entity, "{message}"),
            None => tracing::info!(target: "gloam_script::log", "{message}"),
        }
    }

    /// JavaScript prelude defining the script vocabulary on top of the
    /// `__host_*` primitives. Every registered action and checker becomes a
    /// global function of the same name.
    pub fn prelude(&self) -> String {
        let mut js = String::from(PRELUDE);
        for name in self.actions.names() {
            if is_bindable(name) && !self.checkers.contains(name) {
                let _ = writeln!(js, "function {name}(arg) {{ action(\"{name}\", arg); }}");
            }
        }
        for name in self.checkers.names() {
            if is_bindable(name) {
                let _ = writeln!(js, "function {name}() {{ return __host_check(\"{name}\"); }}");
            }
        }
        js
    }
}

fn point_json(point: Option<Vec2>) -> String {
    match point {
        Some(p) => json!({ "x": p.x, "y": p.y }).to_string(),
        None => "null".to_string(),
    }
}

fn is_bindable(name: &str) -> bool {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    head_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED.contains(&name)
}

const PRELUDE: &str = r#"
function action(name, arg) {
  const err = __host_action(String(name), arg === undefined ? "null" : JSON.stringify(arg));
  if (err) { throw new Error(err); }
}
function check(name) { return __host_check(String(name)); }
function transition(state) { __host_transition(String(state)); }
function emit(event) { __host_emit(String(event)); }
function event(name) { return __host_event(String(name)); }
function consume_event(name) { return __host_consume_event(String(name)); }
function get_position() { return JSON.parse(__host_position()); }
function get_player_position() { return JSON.parse(__host_player_position()); }
function current_state() { return __host_state(); }
function log(message) { __host_log(String(message)); }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> HostBridge {
        HostBridge::new(ActionRegistry::with_builtins(), CheckerRegistry::with_builtins())
    }

    #[test]
    fn actions_are_decoded_when_called() {
        let bridge = bridge();
        assert!(bridge.action("set_animation", "\"run\"").is_ok());
        assert!(bridge.action("stop_x", "null").is_ok());
        assert!(bridge.action("moonwalk", "null").unwrap_err().contains("moonwalk"));
        assert!(bridge.action("start_timer", "\"later\"").is_err());

        let commands = bridge.take_commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(&commands[0], ScriptCommand::Run(Action::SetAnimation(n)) if n == "run"));
    }

    #[test]
    fn events_can_be_read_and_consumed_once() {
        let bridge = bridge();
        bridge.frame.borrow_mut().events = vec!["hit".into(), "hit".into()];
        assert!(bridge.has_event("hit"));
        assert!(bridge.consume_event("hit"));
        assert!(bridge.consume_event("hit"));
        assert!(!bridge.consume_event("hit"));
        assert!(!bridge.has_event("hit"));
    }

    #[test]
    fn checkers_read_the_snapshot() {
        let bridge = bridge();
        {
            let mut frame = bridge.frame.borrow_mut();
            frame.position = Some(Vec2::ZERO);
            frame.player = Some(Vec2::new(10.0, 0.0));
        }
        assert!(bridge.check("see_player"));
        assert!(bridge.check("in_attack_range"));
        assert!(!bridge.check("no_such_checker"));
        assert_eq!(bridge.player_position_json(), r#"{"x":10.0,"y":0.0}"#);
        assert_eq!(bridge.position_json(), r#"{"x":0.0,"y":0.0}"#);
    }

    #[test]
    fn prelude_binds_registry_names() {
        let prelude = bridge().prelude();
        assert!(prelude.contains("function stop_x(arg)"));
        assert!(prelude.contains("function see_player()"));
        assert!(!prelude.contains("function emit_event() "));
        assert!(is_bindable("move_towards_player"));
        assert!(!is_bindable("log"));
        assert!(!is_bindable("9lives"));
        assert!(!is_bindable("with-dash"));
    }
}
