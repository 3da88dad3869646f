// driver.rs - Script backend for the AI system
//
// One interpreter per (entity, script path), created on first dispatch and
// replaced when the entity's script path changes. A tick runs
// `enter` (first tick only), `update`, then `exit`/`enter` for each requested
// state change. Host calls are buffered; if any phase fails the whole tick
// is dropped and the entity keeps its previous state.

use crate::bridge::{HostBridge, ScriptCommand};
use crate::engine::{default_engine, LifecyclePhase, ScriptEngine, ScriptInstance};
use crate::error::ScriptError;
use gloam_ai::{
    ActionRegistry, AiActionContext, CheckerRegistry, EventId, ScriptBackend, StateId, TickOutcome,
    Transition,
};
use gloam_core::ecs::Entity;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// State changes one dispatch may chain through `enter` callbacks.
const MAX_CHAINED_TRANSITIONS: usize = 8;

struct CachedScript {
    path: String,
    /// `None` after a failed load; not retried until the path changes.
    instance: Option<Box<dyn ScriptInstance>>,
}

pub struct ScriptDriver {
    engine: Box<dyn ScriptEngine>,
    host: Rc<HostBridge>,
    root: PathBuf,
    sources: HashMap<String, String>,
    scripts: HashMap<Entity, CachedScript>,
}

impl ScriptDriver {
    /// Driver using the interpreter compiled into this build.
    pub fn new(root: impl Into<PathBuf>, actions: ActionRegistry, checkers: CheckerRegistry) -> Self {
        Self::with_engine(default_engine(), root, actions, checkers)
    }

    pub fn with_engine(
        engine: Box<dyn ScriptEngine>,
        root: impl Into<PathBuf>,
        actions: ActionRegistry,
        checkers: CheckerRegistry,
    ) -> Self {
        Self {
            engine,
            host: Rc::new(HostBridge::new(actions, checkers)),
            root: root.into(),
            sources: HashMap::new(),
            scripts: HashMap::new(),
        }
    }

    /// Serve `path` from memory instead of the script root.
    pub fn add_source(&mut self, path: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.sources.insert(path.into(), source.into());
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached interpreters, failed loads included.
    pub fn cached(&self) -> usize {
        self.scripts.len()
    }

    fn read_source(&self, path: &str) -> Result<String, ScriptError> {
        if let Some(source) = self.sources.get(path) {
            return Ok(source.clone());
        }
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|source| ScriptError::Io { path: full, source })
    }

    fn load(&self, path: &str) -> Result<Box<dyn ScriptInstance>, ScriptError> {
        let source = self.read_source(path)?;
        self.engine.compile(path, &source, self.host.clone())
    }

    /// Cached instance for `entity`, (re)loading when the path changed.
    fn instance(&mut self, entity: Entity, path: &str) -> Option<&dyn ScriptInstance> {
        let stale = self.scripts.get(&entity).map_or(true, |cached| cached.path != path);
        if stale {
            let instance = match self.load(path) {
                Ok(instance) => Some(instance),
                Err(err) => {
                    tracing::error!(%entity, script = path, %err, "script failed to load");
                    None
                }
            };
            self.scripts.insert(
                entity,
                CachedScript {
                    path: path.to_string(),
                    instance,
                },
            );
        }
        self.scripts.get(&entity)?.instance.as_deref()
    }
}

/// Run one tick's lifecycle against the instance. Returns the final state
/// and the changes taken, or the failing error.
fn run_lifecycle(
    instance: &dyn ScriptInstance,
    host: &HostBridge,
    current: Option<StateId>,
    fallback_initial: Option<&str>,
    dt: f32,
) -> Result<(StateId, Vec<Transition>), ScriptError> {
    let mut transitions = Vec::new();

    let mut state = match current {
        Some(state) => state,
        None => {
            let initial = instance
                .get_global("initial_state")?
                .or_else(|| fallback_initial.map(str::to_string))
                .ok_or_else(|| ScriptError::runtime("enter", "no initial_state global and no fallback"))?;
            host.set_state(&initial);
            instance.run_phase(LifecyclePhase::Enter(&initial))?;
            transitions.push(Transition {
                from: None,
                to: initial.clone(),
                event: None,
            });
            initial
        }
    };

    instance.run_phase(LifecyclePhase::Update(&state, dt))?;

    let mut hops = 0;
    while let Some(target) = host.take_transition() {
        if target == state {
            continue;
        }
        if hops == MAX_CHAINED_TRANSITIONS {
            tracing::warn!(from = %state, to = %target, "script transition chain cut off");
            break;
        }
        hops += 1;

        instance.run_phase(LifecyclePhase::Exit(&state))?;
        host.set_state(&target);
        instance.run_phase(LifecyclePhase::Enter(&target))?;
        transitions.push(Transition {
            from: Some(std::mem::replace(&mut state, target.clone())),
            to: target,
            event: None,
        });
    }

    Ok((state, transitions))
}

/// No state change, but events raised before dispatch (phase `on_enter`)
/// still reach the next tick.
fn abandoned(ctx: &mut AiActionContext<'_>) -> TickOutcome {
    TickOutcome {
        transitions: Vec::new(),
        deferred: ctx.take_events(),
    }
}

impl ScriptBackend for ScriptDriver {
    fn dispatch(
        &mut self,
        script: &str,
        ctx: &mut AiActionContext<'_>,
        events: Vec<EventId>,
        dt: f32,
    ) -> TickOutcome {
        let host = self.host.clone();
        let Some(instance) = self.instance(ctx.entity, script) else {
            return abandoned(ctx);
        };

        host.begin(ctx, events);
        let fallback = ctx.config.fsm.as_ref().map(|def| def.initial.as_str());
        let result = run_lifecycle(instance, &host, ctx.state.current.clone(), fallback, dt);
        let commands = host.take_commands();

        let (state, transitions) = match result {
            Ok(done) => done,
            Err(err) => {
                tracing::error!(entity = %ctx.entity, script, %err, "script dispatch abandoned");
                return abandoned(ctx);
            }
        };

        for command in commands {
            match command {
                ScriptCommand::Run(action) => action.run(ctx, dt),
                ScriptCommand::Emit(event) => ctx.enqueue_event(event),
            }
        }
        ctx.state.current = Some(state);
        tracing::trace!(entity = %ctx.entity, script, "script dispatched");

        TickOutcome {
            transitions,
            deferred: ctx.take_events(),
        }
    }

    fn retain(&mut self, alive: &dyn Fn(Entity) -> bool) {
        self.scripts.retain(|entity, _| alive(*entity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullScriptEngine;
    use gloam_ai::{AiConfig, AiContext, AiHost, AiState, AiTuning, Facing};
    use gloam_core::math::Vec2;

    #[derive(Default)]
    struct Host;

    impl AiHost for Host {
        fn position(&self) -> Option<Vec2> {
            None
        }
        fn velocity(&self) -> Vec2 {
            Vec2::ZERO
        }
        fn set_velocity(&mut self, _: Vec2) {}
        fn change_animation(&mut self, _: &str) {}
        fn set_facing(&mut self, _: Facing) {}
    }

    #[test]
    fn failed_loads_are_cached_and_leave_state_alone() {
        let mut driver = ScriptDriver::with_engine(
            Box::new(NullScriptEngine),
            "scripts",
            ActionRegistry::with_builtins(),
            CheckerRegistry::with_builtins(),
        );
        driver.add_source("boss.js", "function update() {}");

        let tuning = AiTuning::default();
        let config = AiConfig::script("boss.js");
        let mut state = AiState::default();
        let mut context = AiContext::default();
        let mut host = Host;
        let entity = Entity::from_bits(3);
        let mut ctx = AiActionContext::new(
            entity,
            &tuning,
            &config,
            &mut state,
            &mut context,
            None,
            None,
            &mut host,
        );

        let outcome = driver.dispatch("boss.js", &mut ctx, vec!["hit".into()], 0.016);
        assert_eq!(outcome, TickOutcome::default());
        assert_eq!(ctx.state.current, None);
        assert_eq!(driver.cached(), 1);

        driver.retain(&|e| e != entity);
        assert_eq!(driver.cached(), 0);
    }

    #[test]
    fn phase_events_survive_a_failed_script() {
        use gloam_ai::{AiEventQueue, AiSystem, FsmCompiler};
        use gloam_core::ecs::{Component, World};
        use gloam_core::spawn;
        use serde_json::json;

        let def = FsmCompiler::default()
            .compile(&json!({
                "initial": "idle",
                "states": {"idle": {}},
                "phases": [{"name": "opening", "start_when": ["always"],
                            "on_enter": [{"emit_event": "phase_started"}]}]
            }))
            .unwrap();
        let config = AiConfig {
            fsm: Some(Rc::new(def)),
            script: Some("boss.js".into()),
        };

        let mut world = World::new();
        let e = spawn!(world, AiState::default(), config, AiEventQueue::default()).unwrap();
        let mut driver = ScriptDriver::with_engine(
            Box::new(NullScriptEngine),
            "scripts",
            ActionRegistry::with_builtins(),
            CheckerRegistry::with_builtins(),
        );
        driver.add_source("boss.js", "function update() {}");

        AiSystem::new().update(&mut world, 0.016, Some(&mut driver));
        assert_eq!(
            world.get(e, AiEventQueue::kind()).unwrap().events,
            vec!["phase_started".to_string()]
        );
        assert_eq!(world.get(e, AiState::kind()).unwrap().current, None);
    }

    #[test]
    fn missing_files_report_the_full_path() {
        let driver = ScriptDriver::with_engine(
            Box::new(NullScriptEngine),
            "scripts",
            ActionRegistry::new(),
            CheckerRegistry::new(),
        );
        let err = driver.read_source("nope.js").unwrap_err();
        assert!(matches!(err, ScriptError::Io { ref path, .. } if path.ends_with("scripts/nope.js")));
    }
}
