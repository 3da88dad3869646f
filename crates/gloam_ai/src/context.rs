// context.rs - The per-tick view actions and checkers operate on
//
// Actions never see the World. They get an `AiActionContext` holding the
// entity's AI components plus an `AiHost` that supplies position/velocity
// and presentation hooks. The host is the seam to physics and rendering.

use crate::components::{
    AiConfig, AiContext, AiState, AiTuning, Animation, EventId, Facing, Position, Velocity,
};
use crate::navigation::PathAgent;
use gloam_core::ecs::{ComponentKind, Entity, World};
use gloam_core::math::Vec2;

/// Capabilities the AI engine consumes from the rest of the engine.
pub trait AiHost {
    fn position(&self) -> Option<Vec2>;
    fn velocity(&self) -> Vec2;
    fn set_velocity(&mut self, velocity: Vec2);
    fn change_animation(&mut self, name: &str);
    fn set_facing(&mut self, facing: Facing);
}

/// Read-only facts checkers are evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct CheckerFacts<'a> {
    pub position: Option<Vec2>,
    pub player: Option<Vec2>,
    pub context: &'a AiContext,
    pub tuning: &'a AiTuning,
    pub path_complete: bool,
}

impl CheckerFacts<'_> {
    /// Distance to the player, if both positions are known.
    pub fn player_distance(&self) -> Option<f32> {
        Some(self.position?.distance(self.player?))
    }
}

/// Ephemeral bundle handed to every action for one entity and one tick.
pub struct AiActionContext<'a> {
    pub entity: Entity,
    pub tuning: &'a AiTuning,
    pub config: &'a AiConfig,
    pub state: &'a mut AiState,
    pub context: &'a mut AiContext,
    pub path: Option<&'a mut PathAgent>,
    /// Player position, `None` when no player was found this tick.
    pub player: Option<Vec2>,
    host: &'a mut (dyn AiHost + 'a),
    events: Vec<EventId>,
}

impl<'a> AiActionContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity: Entity,
        tuning: &'a AiTuning,
        config: &'a AiConfig,
        state: &'a mut AiState,
        context: &'a mut AiContext,
        path: Option<&'a mut PathAgent>,
        player: Option<Vec2>,
        host: &'a mut (dyn AiHost + 'a),
    ) -> Self {
        Self {
            entity,
            tuning,
            config,
            state,
            context,
            path,
            player,
            host,
            events: Vec::new(),
        }
    }

    pub fn position(&self) -> Option<Vec2> {
        self.host.position()
    }

    pub fn velocity(&self) -> Vec2 {
        self.host.velocity()
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.host.set_velocity(velocity);
    }

    pub fn change_animation(&mut self, name: &str) {
        self.host.change_animation(name);
    }

    pub fn set_facing(&mut self, facing: Facing) {
        self.host.set_facing(facing);
    }

    pub fn enqueue_event(&mut self, event: impl Into<EventId>) {
        self.events.push(event.into());
    }

    /// Events raised since the last call, in raise order.
    pub fn take_events(&mut self) -> Vec<EventId> {
        std::mem::take(&mut self.events)
    }

    pub fn player_found(&self) -> bool {
        self.player.is_some()
    }

    pub fn player_distance(&self) -> Option<f32> {
        Some(self.position()?.distance(self.player?))
    }

    pub fn current_state(&self) -> Option<&str> {
        self.state.current.as_deref()
    }

    pub fn facts(&self) -> CheckerFacts<'_> {
        CheckerFacts {
            position: self.position(),
            player: self.player,
            context: self.context,
            tuning: self.tuning,
            path_complete: self.path.as_ref().map_or(true, |path| path.is_complete()),
        }
    }
}

/// [`AiHost`] backed by the entity's `Position`/`Velocity`/`Animation`/
/// `Facing` components.
pub struct WorldHost<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl<'w> WorldHost<'w> {
    pub fn new(world: &'w mut World, entity: Entity) -> Self {
        Self { world, entity }
    }
}

impl AiHost for WorldHost<'_> {
    fn position(&self) -> Option<Vec2> {
        self.world
            .get(self.entity, ComponentKind::<Position>::of())
            .map(|p| p.0)
    }

    fn velocity(&self) -> Vec2 {
        self.world
            .get(self.entity, ComponentKind::<Velocity>::of())
            .map_or(Vec2::ZERO, |v| v.0)
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        if let Err(err) = self.world.insert(self.entity, Velocity(velocity)) {
            tracing::trace!(entity = %self.entity, %err, "set_velocity dropped");
        }
    }

    fn change_animation(&mut self, name: &str) {
        let kind = ComponentKind::<Animation>::of();
        if self.world.get(self.entity, kind).is_some_and(|a| a.name == name) {
            return;
        }
        let animation = Animation {
            name: name.to_string(),
        };
        if let Err(err) = self.world.add(self.entity, kind, animation) {
            tracing::trace!(entity = %self.entity, %err, "change_animation dropped");
        }
    }

    fn set_facing(&mut self, facing: Facing) {
        if let Err(err) = self.world.insert(self.entity, facing) {
            tracing::trace!(entity = %self.entity, %err, "set_facing dropped");
        }
    }
}
