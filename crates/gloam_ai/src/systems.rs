// systems.rs - AI and cooldown systems
//
// Both systems are driven by the caller once per fixed tick, in a fixed
// order. `CooldownSystem` should run before `AiSystem` so an expiring
// cooldown is seen by the AI on the same tick.

use crate::components::{
    AiConfig, AiContext, AiEventQueue, AiInterrupt, AiState, AiTuning, Cooldown, EventId, Health,
    Player, Position,
};
use crate::context::{AiActionContext, WorldHost};
use crate::machine::{self, TickOutcome};
use crate::navigation::PathAgent;
use crate::phase::{AiPhaseController, AiPhaseRuntime};
use gloam_core::ecs::{Component, Entity, World};
use gloam_core::math::Vec2;

/// Position of the first entity tagged [`Player`] that has one.
pub fn player_position(world: &World) -> Option<Vec2> {
    world
        .iter(Player::kind())
        .find_map(|(entity, _)| world.get(entity, Position::kind()).map(|p| p.0))
}

/// Alternate behavior backend for entities whose [`AiConfig`] names a script.
pub trait ScriptBackend {
    /// Run one tick of `script` for the entity behind `ctx`.
    fn dispatch(
        &mut self,
        script: &str,
        ctx: &mut AiActionContext<'_>,
        events: Vec<EventId>,
        dt: f32,
    ) -> TickOutcome;

    /// Drop cached state for entities that no longer pass `alive`.
    fn retain(&mut self, _alive: &dyn Fn(Entity) -> bool) {}
}

/// Runs phases and the FSM (or script backend) for every entity with
/// `AiState` + `AiConfig`.
#[derive(Debug, Default)]
pub struct AiSystem {
    ticks: u64,
}

impl AiSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn update(&mut self, world: &mut World, dt: f32, mut scripts: Option<&mut dyn ScriptBackend>) {
        self.ticks += 1;
        if let Some(backend) = scripts.as_deref_mut() {
            backend.retain(&|entity| world.is_alive(entity));
        }

        let player = player_position(world);
        for entity in world.entities_with(AiState::kind()) {
            // Drained every tick, with or without a config.
            let mut incoming = Vec::new();
            if let Ok(Some(interrupt)) = world.remove(entity, AiInterrupt::kind()) {
                incoming.push(interrupt.event);
            }
            if let Some(queue) = world.get_mut(entity, AiEventQueue::kind()) {
                incoming.extend(queue.drain());
            }

            let Some(config) = world.get(entity, AiConfig::kind()).cloned() else {
                continue;
            };
            let Some(mut state) = world.get(entity, AiState::kind()).cloned() else {
                continue;
            };
            let tuning = world.get(entity, AiTuning::kind()).cloned().unwrap_or_default();
            let mut context = world.get(entity, AiContext::kind()).cloned().unwrap_or_default();
            let mut path = world.get(entity, PathAgent::kind()).cloned();
            let mut phases = world.get(entity, AiPhaseRuntime::kind()).cloned().or_else(|| {
                config
                    .fsm
                    .as_ref()
                    .filter(|def| !def.phases.is_empty())
                    .map(|_| AiPhaseRuntime::default())
            });
            let hp = world.get(entity, Health::kind()).map(|h| h.current);

            tracing::trace!(%entity, events = incoming.len(), "ai dispatch");

            let outcome = {
                let mut host = WorldHost::new(world, entity);
                let mut ctx = AiActionContext::new(
                    entity,
                    &tuning,
                    &config,
                    &mut state,
                    &mut context,
                    path.as_mut(),
                    player,
                    &mut host,
                );

                if let (Some(def), Some(runtime)) = (config.fsm.as_ref(), phases.as_mut()) {
                    AiPhaseController::new(def.clone()).update(runtime, hp, &mut ctx, dt);
                }

                match (config.script.as_deref(), scripts.as_deref_mut()) {
                    (Some(script), Some(backend)) => backend.dispatch(script, &mut ctx, incoming, dt),
                    _ => match config.fsm.as_deref() {
                        Some(def) => {
                            let table = match phases.as_ref() {
                                Some(runtime) => runtime.transitions(def),
                                None => &def.transitions,
                            };
                            machine::tick(def, table, &mut ctx, incoming, dt)
                        }
                        None => TickOutcome::default(),
                    },
                }
            };

            for t in &outcome.transitions {
                tracing::debug!(
                    %entity,
                    from = t.from.as_deref().unwrap_or("-"),
                    to = %t.to,
                    event = t.event.as_deref().unwrap_or("-"),
                    "state changed"
                );
            }

            let written = world
                .insert(entity, state)
                .and_then(|()| world.insert(entity, context))
                .and_then(|()| path.map_or(Ok(()), |path| world.insert(entity, path)))
                .and_then(|()| phases.map_or(Ok(()), |runtime| world.insert(entity, runtime)))
                .and_then(|()| defer_events(world, entity, outcome.deferred));
            if let Err(err) = written {
                tracing::warn!(%entity, %err, "ai write-back failed");
            }
        }
    }
}

fn defer_events(
    world: &mut World,
    entity: Entity,
    events: Vec<EventId>,
) -> Result<(), gloam_core::ecs::WorldError> {
    if events.is_empty() {
        return Ok(());
    }
    match world.get_mut(entity, AiEventQueue::kind()) {
        Some(queue) => {
            queue.events.extend(events);
            Ok(())
        }
        None => world.insert(entity, AiEventQueue { events }),
    }
}

/// Counts [`Cooldown`]s down and turns expiries into [`AiInterrupt`]s.
#[derive(Debug, Default)]
pub struct CooldownSystem;

impl CooldownSystem {
    pub fn new() -> Self {
        Self
    }

    pub fn update(&mut self, world: &mut World, dt: f32) {
        let mut expired = Vec::new();
        world.for_each(Cooldown::kind(), |entity, cooldown| {
            cooldown.remaining -= dt;
            if cooldown.remaining <= 0.0 {
                expired.push(entity);
            }
        });

        for entity in expired {
            let Ok(Some(cooldown)) = world.remove(entity, Cooldown::kind()) else {
                continue;
            };
            tracing::trace!(%entity, event = %cooldown.event, "cooldown finished");
            if let Err(err) = world.insert(entity, AiInterrupt { event: cooldown.event }) {
                tracing::warn!(%entity, %err, "cooldown interrupt dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Animation, COOLDOWN_FINISHED};
    use crate::fsm::FsmCompiler;
    use gloam_core::spawn;
    use serde_json::json;
    use std::rc::Rc;

    fn guard() -> AiConfig {
        let def = FsmCompiler::default()
            .compile(&json!({
                "initial": "idle",
                "states": {
                    "idle": {"on_enter": [{"set_animation": "idle"}]},
                    "alert": {"on_enter": [{"set_animation": "alert"}, {"emit_event": "shout"}]},
                    "shouting": {}
                },
                "transitions": {
                    "idle": {"cooldown_finished": "alert"},
                    "alert": {"shout": "shouting"}
                }
            }))
            .unwrap();
        AiConfig::fsm(Rc::new(def))
    }

    #[test]
    fn cooldown_interrupt_drives_a_transition() {
        let mut world = World::new();
        let e = spawn!(world, AiState::default(), guard(), Cooldown::new(0.05)).unwrap();
        let mut cooldowns = CooldownSystem::new();
        let mut ai = AiSystem::new();

        cooldowns.update(&mut world, 0.016);
        ai.update(&mut world, 0.016, None);
        assert!(world.get(e, AiState::kind()).unwrap().is("idle"));

        for _ in 0..3 {
            cooldowns.update(&mut world, 0.016);
        }
        assert!(!world.has(e, Cooldown::kind()));
        assert_eq!(
            world.get(e, AiInterrupt::kind()).map(|i| i.event.as_str()),
            Some(COOLDOWN_FINISHED)
        );

        ai.update(&mut world, 0.016, None);
        assert!(world.get(e, AiState::kind()).unwrap().is("alert"));
        assert!(!world.has(e, AiInterrupt::kind()));
        assert_eq!(world.get(e, Animation::kind()).unwrap().name, "alert");
        assert_eq!(world.get(e, AiEventQueue::kind()).unwrap().events, vec!["shout".to_string()]);

        ai.update(&mut world, 0.016, None);
        assert!(world.get(e, AiState::kind()).unwrap().is("shouting"));
        assert!(world.get(e, AiEventQueue::kind()).unwrap().events.is_empty());
    }

    #[test]
    fn entities_without_config_are_skipped_but_drained() {
        let mut world = World::new();
        let mut queue = AiEventQueue::default();
        queue.push("hit");
        let e = spawn!(
            world,
            AiState::default(),
            queue,
            AiInterrupt {
                event: COOLDOWN_FINISHED.to_string()
            }
        )
        .unwrap();
        AiSystem::new().update(&mut world, 0.016, None);
        assert_eq!(world.get(e, AiState::kind()).unwrap().current, None);
        assert!(world.get(e, AiEventQueue::kind()).unwrap().events.is_empty());
        assert!(!world.has(e, AiInterrupt::kind()));
    }

    #[test]
    fn player_position_requires_both_components() {
        let mut world = World::new();
        spawn!(world, Player).unwrap();
        assert_eq!(player_position(&world), None);
        spawn!(world, Player, Position(Vec2::new(1.0, 2.0))).unwrap();
        assert_eq!(player_position(&world), Some(Vec2::new(1.0, 2.0)));
    }
}
