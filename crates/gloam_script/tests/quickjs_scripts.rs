//! Scripted behaviors running on the embedded QuickJS engine.
#![cfg(feature = "quickjs")]

use gloam_ai::{
    ActionRegistry, AiConfig, AiEventQueue, AiState, AiSystem, Animation, CheckerRegistry, Player,
    Position, Velocity,
};
use gloam_core::ecs::{Component, Entity, World};
use gloam_core::math::Vec2;
use gloam_core::spawn;
use gloam_script::ScriptDriver;

const DT: f32 = 1.0 / 60.0;

const GUARD: &str = r#"
var initial_state = "idle";
function enter(state) { set_animation(state); }
function update(state, dt) {
  if (state === "idle" && consume_event("alarm")) { transition("alert"); }
  if (state === "alert") { stop(); emit("shouted"); }
}
function exit(state) { log("leaving " + state); }
"#;

fn driver() -> ScriptDriver {
    let mut driver = ScriptDriver::new(
        "scripts",
        ActionRegistry::with_builtins(),
        CheckerRegistry::with_builtins(),
    );
    driver.add_source("guard.js", GUARD);
    driver
}

fn guard(world: &mut World, script: &str) -> Entity {
    spawn!(
        world,
        AiState::default(),
        AiConfig::script(script),
        AiEventQueue::default(),
        Position(Vec2::ZERO),
        Velocity(Vec2::new(3.0, 4.0))
    )
    .unwrap()
}

fn state_of(world: &World, e: Entity) -> Option<String> {
    world.get(e, AiState::kind()).and_then(|s| s.current.clone())
}

fn animation_of(world: &World, e: Entity) -> Option<String> {
    world.get(e, Animation::kind()).map(|a| a.name.clone())
}

#[test]
fn lifecycle_follows_script_transitions() {
    let mut world = World::new();
    let e = guard(&mut world, "guard.js");
    let mut scripts = driver();
    let mut ai = AiSystem::new();

    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("idle"));
    assert_eq!(animation_of(&world, e).as_deref(), Some("idle"));

    world.get_mut(e, AiEventQueue::kind()).unwrap().push("alarm");
    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("alert"));
    assert_eq!(animation_of(&world, e).as_deref(), Some("alert"));

    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(world.get(e, Velocity::kind()).unwrap().0, Vec2::ZERO);
    assert_eq!(
        world.get(e, AiEventQueue::kind()).unwrap().events,
        vec!["shouted".to_string()]
    );
}

#[test]
fn runtime_errors_abandon_the_tick() {
    let mut world = World::new();
    let e = guard(&mut world, "fragile.js");
    let mut scripts = driver();
    scripts.add_source(
        "fragile.js",
        r#"
        var initial_state = "idle";
        function update(state) {
          set_animation("busy");
          if (event("boom")) { transition("broken"); throw new Error("kaboom"); }
        }
        "#,
    );
    let mut ai = AiSystem::new();

    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(animation_of(&world, e).as_deref(), Some("busy"));

    world.insert(e, Animation { name: "manual".into() }).unwrap();
    world.get_mut(e, AiEventQueue::kind()).unwrap().push("boom");
    ai.update(&mut world, DT, Some(&mut scripts));

    assert_eq!(state_of(&world, e).as_deref(), Some("idle"));
    assert_eq!(animation_of(&world, e).as_deref(), Some("manual"));
}

#[test]
fn bad_action_arguments_throw_in_script() {
    let mut world = World::new();
    let e = guard(&mut world, "typo.js");
    let mut scripts = driver();
    scripts.add_source(
        "typo.js",
        r#"
        var initial_state = "idle";
        var caught = "";
        function update(state) {
          try { start_timer("soon"); } catch (e) { caught = e.message; }
          if (caught.indexOf("start_timer") >= 0) { transition("recovered"); }
        }
        "#,
    );
    let mut ai = AiSystem::new();
    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("recovered"));
}

#[test]
fn checkers_and_positions_are_visible_to_scripts() {
    let mut world = World::new();
    spawn!(world, Player, Position(Vec2::new(30.0, 0.0))).unwrap();
    let e = guard(&mut world, "watcher.js");
    let mut scripts = driver();
    scripts.add_source(
        "watcher.js",
        r#"
        var initial_state = "idle";
        function update(state) {
          var p = get_player_position();
          var me = get_position();
          if (see_player() && p.x === 30 && me.x === 0) { transition("spotted"); }
        }
        "#,
    );
    let mut ai = AiSystem::new();
    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("spotted"));
}

#[test]
fn changing_the_script_path_reloads() {
    let mut world = World::new();
    let e = guard(&mut world, "guard.js");
    let mut scripts = driver();
    scripts.add_source("other.js", r#"var initial_state = "other";"#);
    let mut ai = AiSystem::new();

    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("idle"));

    world.insert(e, AiConfig::script("other.js")).unwrap();
    world.insert(e, AiState::default()).unwrap();
    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(state_of(&world, e).as_deref(), Some("other"));
    assert_eq!(scripts.cached(), 1);

    world.destroy(e);
    ai.update(&mut world, DT, Some(&mut scripts));
    assert_eq!(scripts.cached(), 0);
}
