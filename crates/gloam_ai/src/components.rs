//! Components read and written by the AI systems.
//!
//! The first group is owned by the AI engine. The second group is the data
//! surface shared with the surrounding engine (physics writes `Position`,
//! rendering reads `Animation` and `Facing`); the AI only ever touches it
//! through [`AiActionContext`](crate::AiActionContext) capabilities.

use crate::fsm::FsmDef;
use gloam_core::math::{Aabb, Vec2};
use serde::Deserialize;
use std::rc::Rc;

pub type StateId = String;
pub type EventId = String;

/// Raised by `tick_timer` when `AiContext::timer` runs out.
pub const TIMER_EXPIRED: &str = "timer_expired";
/// Raised by `tick_attack_timer` when the attack cooldown runs out.
pub const ATTACK_READY: &str = "attack_ready";
/// Default event carried by a [`Cooldown`] when it finishes.
pub const COOLDOWN_FINISHED: &str = "cooldown_finished";

/// The only persisted FSM field: the active state, `None` before first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiState {
    pub current: Option<StateId>,
}

impl AiState {
    pub fn is(&self, state: &str) -> bool {
        self.current.as_deref() == Some(state)
    }
}

/// Timers driven by the timer actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiContext {
    pub timer: f32,
    pub attack_timer: f32,
}

/// Events queued for the next AI tick. Drained every tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiEventQueue {
    pub events: Vec<EventId>,
}

impl AiEventQueue {
    pub fn push(&mut self, event: impl Into<EventId>) {
        self.events.push(event.into());
    }

    pub fn drain(&mut self) -> Vec<EventId> {
        std::mem::take(&mut self.events)
    }
}

/// One-shot event raised by another system (combat hit, cooldown finished).
/// Consumed before the event queue on the next AI tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiInterrupt {
    pub event: EventId,
}

/// Per-entity tuning values used as action defaults and checker thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    pub move_speed: f32,
    pub sight_range: f32,
    pub lose_sight_range: f32,
    pub attack_range: f32,
    pub attack_cooldown: f32,
    pub waypoint_tolerance: f32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            move_speed: 60.0,
            sight_range: 160.0,
            lose_sight_range: 240.0,
            attack_range: 24.0,
            attack_cooldown: 1.0,
            waypoint_tolerance: 4.0,
        }
    }
}

/// Which behavior backend drives an entity.
///
/// With `script` set the script backend decides; `fsm` then only supplies
/// the fallback initial state. Without a script the compiled FSM runs.
#[derive(Debug, Clone, Default)]
pub struct AiConfig {
    pub fsm: Option<Rc<FsmDef>>,
    pub script: Option<String>,
}

impl AiConfig {
    pub fn fsm(def: Rc<FsmDef>) -> Self {
        Self {
            fsm: Some(def),
            script: None,
        }
    }

    pub fn script(path: impl Into<String>) -> Self {
        Self {
            fsm: None,
            script: Some(path.into()),
        }
    }
}

/// Countdown that raises an [`AiInterrupt`] with `event` when it expires.
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldown {
    pub remaining: f32,
    pub event: EventId,
}

impl Cooldown {
    pub fn new(seconds: f32) -> Self {
        Self {
            remaining: seconds,
            event: COOLDOWN_FINISHED.to_string(),
        }
    }

    pub fn with_event(seconds: f32, event: impl Into<EventId>) -> Self {
        Self {
            remaining: seconds,
            event: event.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared with the surrounding engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position(pub Vec2);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Animation {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }
}

/// Marks the entity AI treats as "the player".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Player;

/// Static level geometry; blocks pathfinding cells it overlaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticCollider(pub Aabb);
