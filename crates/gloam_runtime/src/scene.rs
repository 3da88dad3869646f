//! Demo scene for the headless runtime.
//!
//! A pathing brute that turns aggressive once wounded, a sentry driven by a
//! script, and a stationary player behind a wall.

use anyhow::{Context, Result};
use gloam_ai::{
    AiConfig, AiContext, AiEventQueue, AiState, AiTuning, Animation, Cooldown, Facing, FsmCompiler,
    Health, PathAgent, Player, Position, StaticCollider, Velocity,
};
use gloam_core::ecs::{Entity, World};
use gloam_core::math::{Aabb, Vec2};
use gloam_core::spawn;
use gloam_services::Settings;
use std::rc::Rc;

pub const BRUTE_SPEC: &str = r#"{
  "initial": "idle",
  "states": {
    "idle": {
      "on_enter": [{"set_animation": "idle"}],
      "while": ["stop"]
    },
    "chase": {
      "on_enter": [{"set_animation": "run"}],
      "while": [{"follow_path": 48}]
    },
    "attack": {
      "on_enter": [{"set_animation": "attack"}, "stop", "face_player", {"start_timer": 0.5}],
      "while": ["tick_timer"],
      "on_exit": [{"print": "swing finished"}]
    },
    "rest": {
      "on_enter": [{"set_animation": "rest"}, "stop", {"start_timer": 1.5}],
      "while": ["tick_timer"]
    }
  },
  "transitions": {
    "idle": {"see_player": "chase"},
    "chase": [{"in_attack_range": "attack"}, {"lost_player": "idle"}],
    "attack": {"timer_expired": "chase"},
    "rest": {"timer_expired": "chase"}
  },
  "phases": [
    {"name": "steady", "start_when": ["always"]},
    {
      "name": "enraged",
      "start_when": [{"hp_lte": 50}],
      "on_enter": [{"print": "brute is enraged"}, {"set_animation": "roar"}],
      "transitions": {"attack": {"timer_expired": "rest"}}
    }
  ]
}"#;

pub const SENTRY_PATH: &str = "sentry.js";

pub const SENTRY_SCRIPT: &str = r#"
var initial_state = "watch";
function enter(state) { set_animation(state); }
function update(state, dt) {
  if (consume_event("shift_change")) { log("shift change"); }
  if (state === "watch") {
    stop();
    if (see_player()) { transition("alarm"); }
  } else if (state === "alarm") {
    face_player();
    emit_event("spotted");
    if (lost_player()) { transition("watch"); }
  }
}
function exit(state) { log("sentry leaves " + state); }
"#;

/// Entities the runtime reports on.
pub struct Scene {
    pub player: Entity,
    pub brute: Entity,
    pub sentry: Option<Entity>,
}

pub fn build(world: &mut World, settings: &Settings) -> Result<Scene> {
    let brute_def = FsmCompiler::default()
        .compile_str(BRUTE_SPEC)
        .context("failed to compile the brute behavior")?;

    let player = spawn!(world, Player, Position(Vec2::new(320.0, 40.0)))?;

    // Wall between the brute and the player, with a gap at the top.
    spawn!(
        world,
        StaticCollider(Aabb::new(Vec2::new(192.0, 0.0), Vec2::new(224.0, 288.0)))
    )?;

    let brute = spawn!(
        world,
        AiState::default(),
        AiConfig::fsm(Rc::new(brute_def)),
        AiContext::default(),
        AiEventQueue::default(),
        AiTuning {
            sight_range: 400.0,
            lose_sight_range: 480.0,
            ..AiTuning::default()
        },
        Health::new(100.0),
        PathAgent::new(settings.navigation.repath_interval),
        Position(Vec2::new(40.0, 40.0)),
        Velocity::default(),
        Facing::default(),
        Animation::default()
    )?;

    let sentry = if settings.scripting.enabled {
        Some(spawn!(
            world,
            AiState::default(),
            AiConfig::script(SENTRY_PATH),
            AiEventQueue::default(),
            Position(Vec2::new(400.0, 40.0)),
            Velocity::default(),
            Facing::default(),
            Animation::default(),
            Cooldown::with_event(2.0, "shift_change")
        )?)
    } else {
        None
    };

    Ok(Scene {
        player,
        brute,
        sentry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brute_spec_compiles_with_builtins() {
        let def = FsmCompiler::default().compile_str(BRUTE_SPEC).unwrap();
        assert_eq!(def.initial, "idle");
        assert_eq!(def.phases.len(), 2);
        assert_eq!(def.transitions.target("chase", "lost_player"), Some("idle"));
    }

    #[test]
    fn scene_skips_the_sentry_without_scripting() {
        let mut settings = Settings::default();
        settings.scripting.enabled = false;
        let mut world = World::new();
        let scene = build(&mut world, &settings).unwrap();
        assert!(scene.sentry.is_none());
        assert!(world.is_alive(scene.brute));
        assert!(world.is_alive(scene.player));
    }
}
