// action.rs - Action vocabulary and registry
//
// Spec entries are decoded into `Action` once, at load time. The registry
// maps each action name to a decoder that validates the argument and builds
// the typed variant; nothing at tick time looks at JSON.

use crate::components::{Facing, ATTACK_READY, TIMER_EXPIRED};
use crate::context::AiActionContext;
use crate::error::ActionError;
use gloam_core::math::Vec2;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Horizontal distance under which "move towards" stops instead of jittering.
const ARRIVE_EPSILON: f32 = 1.0;

type CustomFn = dyn Fn(&mut AiActionContext<'_>, f32);
type Decoder = dyn Fn(Option<&Value>) -> Result<Action, &'static str>;

/// A compiled action. Runs sequentially in authored order.
#[derive(Clone)]
pub enum Action {
    Print(String),
    SetAnimation(String),
    StopX,
    Stop,
    MoveTowardsPlayer { speed: Option<f32> },
    MoveAwayFromPlayer { speed: Option<f32> },
    FlyTowardsPlayer { speed: Option<f32> },
    FacePlayer,
    StartTimer(f32),
    TickTimer,
    StartAttackTimer(Option<f32>),
    TickAttackTimer,
    EmitEvent(String),
    FollowPath { speed: Option<f32> },
    SetVelocity(Vec2),
    /// Host-registered closure.
    Custom { name: Rc<str>, run: Rc<CustomFn> },
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Print(msg) => f.debug_tuple("Print").field(msg).finish(),
            Action::SetAnimation(name) => f.debug_tuple("SetAnimation").field(name).finish(),
            Action::StopX => f.write_str("StopX"),
            Action::Stop => f.write_str("Stop"),
            Action::MoveTowardsPlayer { speed } => {
                f.debug_struct("MoveTowardsPlayer").field("speed", speed).finish()
            }
            Action::MoveAwayFromPlayer { speed } => {
                f.debug_struct("MoveAwayFromPlayer").field("speed", speed).finish()
            }
            Action::FlyTowardsPlayer { speed } => {
                f.debug_struct("FlyTowardsPlayer").field("speed", speed).finish()
            }
            Action::FacePlayer => f.write_str("FacePlayer"),
            Action::StartTimer(secs) => f.debug_tuple("StartTimer").field(secs).finish(),
            Action::TickTimer => f.write_str("TickTimer"),
            Action::StartAttackTimer(secs) => f.debug_tuple("StartAttackTimer").field(secs).finish(),
            Action::TickAttackTimer => f.write_str("TickAttackTimer"),
            Action::EmitEvent(event) => f.debug_tuple("EmitEvent").field(event).finish(),
            Action::FollowPath { speed } => f.debug_struct("FollowPath").field("speed", speed).finish(),
            Action::SetVelocity(v) => f.debug_tuple("SetVelocity").field(v).finish(),
            Action::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

impl Action {
    pub fn run(&self, ctx: &mut AiActionContext<'_>, dt: f32) {
        match self {
            Action::Print(msg) => {
                tracing::info!(target: "gloam_ai::print", entity = %ctx.entity, "{msg}");
            }
            Action::SetAnimation(name) => ctx.change_animation(name),
            Action::StopX => {
                let v = ctx.velocity();
                ctx.set_velocity(Vec2::new(0.0, v.y));
            }
            Action::Stop => ctx.set_velocity(Vec2::ZERO),
            Action::MoveTowardsPlayer { speed } => {
                let speed = speed.unwrap_or(ctx.tuning.move_speed);
                move_horizontally(ctx, speed);
            }
            Action::MoveAwayFromPlayer { speed } => {
                let speed = speed.unwrap_or(ctx.tuning.move_speed);
                move_horizontally(ctx, -speed);
            }
            Action::FlyTowardsPlayer { speed } => {
                let speed = speed.unwrap_or(ctx.tuning.move_speed);
                let (Some(pos), Some(player)) = (ctx.position(), ctx.player) else {
                    ctx.set_velocity(Vec2::ZERO);
                    return;
                };
                let delta = player - pos;
                ctx.set_velocity(delta.normalize_or_zero() * speed);
                face_towards(ctx, delta.x);
            }
            Action::FacePlayer => {
                if let (Some(pos), Some(player)) = (ctx.position(), ctx.player) {
                    face_towards(ctx, player.x - pos.x);
                }
            }
            Action::StartTimer(secs) => ctx.context.timer = *secs,
            Action::TickTimer => {
                if count_down(&mut ctx.context.timer, dt) {
                    ctx.enqueue_event(TIMER_EXPIRED);
                }
            }
            Action::StartAttackTimer(secs) => {
                ctx.context.attack_timer = secs.unwrap_or(ctx.tuning.attack_cooldown);
            }
            Action::TickAttackTimer => {
                if count_down(&mut ctx.context.attack_timer, dt) {
                    ctx.enqueue_event(ATTACK_READY);
                }
            }
            Action::EmitEvent(event) => ctx.enqueue_event(event.as_str()),
            Action::FollowPath { speed } => {
                let speed = speed.unwrap_or(ctx.tuning.move_speed);
                follow_path(ctx, speed);
            }
            Action::SetVelocity(v) => ctx.set_velocity(*v),
            Action::Custom { run, .. } => run(ctx, dt),
        }
    }
}

/// Count `timer` down by `dt`. True only on the tick it reaches zero.
fn count_down(timer: &mut f32, dt: f32) -> bool {
    if *timer <= 0.0 {
        return false;
    }
    *timer -= dt;
    if *timer <= 0.0 {
        *timer = 0.0;
        return true;
    }
    false
}

fn face_towards(ctx: &mut AiActionContext<'_>, dx: f32) {
    if dx < 0.0 {
        ctx.set_facing(Facing::Left);
    } else if dx > 0.0 {
        ctx.set_facing(Facing::Right);
    }
}

/// Signed speed: positive moves toward the player, negative away.
fn move_horizontally(ctx: &mut AiActionContext<'_>, speed: f32) {
    let v = ctx.velocity();
    let (Some(pos), Some(player)) = (ctx.position(), ctx.player) else {
        ctx.set_velocity(Vec2::new(0.0, v.y));
        return;
    };
    let dx = player.x - pos.x;
    if dx.abs() <= ARRIVE_EPSILON {
        ctx.set_velocity(Vec2::new(0.0, v.y));
        return;
    }
    let vx = dx.signum() * speed;
    ctx.set_velocity(Vec2::new(vx, v.y));
    face_towards(ctx, vx);
}

fn follow_path(ctx: &mut AiActionContext<'_>, speed: f32) {
    let Some(pos) = ctx.position() else {
        return;
    };
    let tolerance = ctx.tuning.waypoint_tolerance;
    let target = match ctx.path.as_deref_mut() {
        Some(path) => path.steer_target(pos, tolerance),
        None => return,
    };
    match target {
        Some(waypoint) => {
            let delta = waypoint - pos;
            ctx.set_velocity(delta.normalize_or_zero() * speed);
            face_towards(ctx, delta.x);
        }
        None => ctx.set_velocity(Vec2::ZERO),
    }
}

// ---------------------------------------------------------------------------
// Entry decoding
// ---------------------------------------------------------------------------

/// Split a spec entry into `(name, argument)`.
///
/// Accepts `"name"` or `{"name": arg}`; a `null` or `true` argument means
/// none was given.
pub fn split_entry(entry: &Value) -> Result<(&str, Option<&Value>), String> {
    match entry {
        Value::String(name) => Ok((name.as_str(), None)),
        Value::Object(map) if map.len() == 1 => {
            let Some((name, arg)) = map.iter().next() else {
                return Err("empty action map".into());
            };
            let arg = match arg {
                Value::Null | Value::Bool(true) => None,
                other => Some(other),
            };
            Ok((name.as_str(), arg))
        }
        Value::Object(map) => Err(format!("expected a single-key map, found {} keys", map.len())),
        other => Err(format!("expected a string or single-key map, found {other}")),
    }
}

fn no_arg(action: Action) -> impl Fn(Option<&Value>) -> Result<Action, &'static str> {
    move |arg| match arg {
        None => Ok(action.clone()),
        Some(_) => Err("no argument"),
    }
}

fn string_arg(arg: Option<&Value>) -> Result<String, &'static str> {
    arg.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or("a string argument")
}

fn number_arg(arg: Option<&Value>) -> Result<f32, &'static str> {
    arg.and_then(Value::as_f64)
        .map(|n| n as f32)
        .ok_or("a number argument")
}

fn optional_number_arg(arg: Option<&Value>) -> Result<Option<f32>, &'static str> {
    match arg {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(|n| Some(n as f32))
            .ok_or("an optional number argument"),
    }
}

fn vec2_arg(arg: Option<&Value>) -> Result<Vec2, &'static str> {
    const EXPECTED: &str = "an [x, y] array";
    let items = arg.and_then(Value::as_array).ok_or(EXPECTED)?;
    match items.as_slice() {
        [x, y] => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok(Vec2::new(x as f32, y as f32)),
            _ => Err(EXPECTED),
        },
        _ => Err(EXPECTED),
    }
}

/// Name -> decoder table injected into the compiler and script adapter.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    decoders: HashMap<String, Rc<Decoder>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin vocabulary.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("print", |arg| string_arg(arg).map(Action::Print));
        r.register("set_animation", |arg| string_arg(arg).map(Action::SetAnimation));
        r.register("stop_x", no_arg(Action::StopX));
        r.register("stop", no_arg(Action::Stop));
        r.register("move_towards_player", |arg| {
            optional_number_arg(arg).map(|speed| Action::MoveTowardsPlayer { speed })
        });
        r.register("move_away_from_player", |arg| {
            optional_number_arg(arg).map(|speed| Action::MoveAwayFromPlayer { speed })
        });
        r.register("fly_towards_player", |arg| {
            optional_number_arg(arg).map(|speed| Action::FlyTowardsPlayer { speed })
        });
        r.register("face_player", no_arg(Action::FacePlayer));
        r.register("start_timer", |arg| number_arg(arg).map(Action::StartTimer));
        r.register("tick_timer", no_arg(Action::TickTimer));
        r.register("start_attack_timer", |arg| {
            optional_number_arg(arg).map(Action::StartAttackTimer)
        });
        r.register("tick_attack_timer", no_arg(Action::TickAttackTimer));
        r.register("emit_event", |arg| string_arg(arg).map(Action::EmitEvent));
        r.register("follow_path", |arg| {
            optional_number_arg(arg).map(|speed| Action::FollowPath { speed })
        });
        r.register("set_velocity", |arg| vec2_arg(arg).map(Action::SetVelocity));
        r
    }

    /// Register or replace a decoder. The decoder returns the expected
    /// argument shape on failure.
    pub fn register(
        &mut self,
        name: &str,
        decoder: impl Fn(Option<&Value>) -> Result<Action, &'static str> + 'static,
    ) -> &mut Self {
        self.decoders.insert(name.to_string(), Rc::new(decoder));
        self
    }

    /// Register a closure as an argument-less custom action.
    pub fn register_fn(
        &mut self,
        name: &str,
        run: impl Fn(&mut AiActionContext<'_>, f32) + 'static,
    ) -> &mut Self {
        let action = Action::Custom {
            name: Rc::from(name),
            run: Rc::new(run),
        };
        self.register(name, no_arg(action))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn decode(&self, name: &str, arg: Option<&Value>) -> Result<Action, ActionError> {
        let decoder = self.decoders.get(name).ok_or_else(|| ActionError::Unknown {
            name: name.to_string(),
        })?;
        decoder(arg).map_err(|expected| ActionError::InvalidArgument {
            name: name.to_string(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{Fixture, TestHost};
    use serde_json::json;

    fn decode(entry: Value) -> Result<Action, ActionError> {
        let (name, arg) = split_entry(&entry).unwrap();
        ActionRegistry::with_builtins().decode(name, arg)
    }

    #[test]
    fn entries_accept_string_and_single_key_map() {
        assert!(matches!(decode(json!("stop_x")), Ok(Action::StopX)));
        assert!(matches!(decode(json!({"stop": null})), Ok(Action::Stop)));
        assert!(matches!(decode(json!({"face_player": true})), Ok(Action::FacePlayer)));
        assert!(matches!(
            decode(json!({"set_animation": "run"})),
            Ok(Action::SetAnimation(name)) if name == "run"
        ));
        assert!(matches!(
            decode(json!({"move_towards_player": 80})),
            Ok(Action::MoveTowardsPlayer { speed: Some(s) }) if s == 80.0
        ));
        assert!(matches!(
            decode(json!("move_towards_player")),
            Ok(Action::MoveTowardsPlayer { speed: None })
        ));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(split_entry(&json!({"a": 1, "b": 2})).is_err());
        assert!(split_entry(&json!(42)).is_err());
        assert_eq!(
            decode(json!("teleport")).unwrap_err(),
            ActionError::Unknown {
                name: "teleport".into()
            }
        );
        assert!(matches!(
            decode(json!({"start_timer": "soon"})),
            Err(ActionError::InvalidArgument { .. })
        ));
        assert!(matches!(
            decode(json!({"set_velocity": [1.0]})),
            Err(ActionError::InvalidArgument { .. })
        ));
        assert!(matches!(
            decode(json!({"stop": 3})),
            Err(ActionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn tick_timer_emits_once_on_expiry() {
        let mut fx = Fixture::default();
        let mut ctx = fx.ctx();
        Action::StartTimer(0.25).run(&mut ctx, 0.0);
        Action::TickTimer.run(&mut ctx, 0.1);
        assert!(ctx.take_events().is_empty());
        Action::TickTimer.run(&mut ctx, 0.2);
        assert_eq!(ctx.take_events(), vec![TIMER_EXPIRED.to_string()]);
        Action::TickTimer.run(&mut ctx, 0.2);
        assert!(ctx.take_events().is_empty());
        assert_eq!(ctx.context.timer, 0.0);
    }

    #[test]
    fn start_attack_timer_defaults_to_tuning() {
        let mut fx = Fixture::default();
        fx.tuning.attack_cooldown = 0.75;
        let mut ctx = fx.ctx();
        Action::StartAttackTimer(None).run(&mut ctx, 0.0);
        assert_eq!(ctx.context.attack_timer, 0.75);
        Action::TickAttackTimer.run(&mut ctx, 1.0);
        assert_eq!(ctx.take_events(), vec![ATTACK_READY.to_string()]);
    }

    #[test]
    fn move_towards_player_is_horizontal_and_faces() {
        let mut fx = Fixture {
            host: TestHost {
                velocity: Vec2::new(5.0, -3.0),
                ..TestHost::at(Vec2::new(100.0, 0.0))
            },
            player: Some(Vec2::new(20.0, 50.0)),
            ..Default::default()
        };
        Action::MoveTowardsPlayer { speed: Some(40.0) }.run(&mut fx.ctx(), 0.016);
        assert_eq!(fx.host.velocity, Vec2::new(-40.0, -3.0));
        assert_eq!(fx.host.facing, Some(Facing::Left));

        Action::MoveAwayFromPlayer { speed: None }.run(&mut fx.ctx(), 0.016);
        assert_eq!(fx.host.velocity, Vec2::new(fx.tuning.move_speed, -3.0));
        assert_eq!(fx.host.facing, Some(Facing::Right));
    }

    #[test]
    fn fly_towards_player_moves_in_two_dimensions() {
        let mut fx = Fixture {
            host: TestHost::at(Vec2::ZERO),
            player: Some(Vec2::new(0.0, 10.0)),
            ..Default::default()
        };
        Action::FlyTowardsPlayer { speed: Some(2.0) }.run(&mut fx.ctx(), 0.016);
        assert_eq!(fx.host.velocity, Vec2::new(0.0, 2.0));
    }

    #[test]
    fn custom_actions_run_registered_closure() {
        let mut registry = ActionRegistry::with_builtins();
        registry.register_fn("jump", |ctx, _| ctx.set_velocity(Vec2::new(0.0, -200.0)));
        let action = registry.decode("jump", None).unwrap();

        let mut fx = Fixture::default();
        action.run(&mut fx.ctx(), 0.016);
        assert_eq!(fx.host.velocity, Vec2::new(0.0, -200.0));
        assert_eq!(format!("{action:?}"), "Custom(\"jump\")");
    }
}
