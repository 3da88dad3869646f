//! Gloam Scripting
//!
//! Scripted behaviors for the AI system. A script defines `enter(state)`,
//! `update(state, dt)` and optionally `exit(state)`, and drives the entity
//! through the same vocabulary as declarative specs:
//!
//! ```js
//! var initial_state = "idle";
//! function update(state, dt) {
//!   if (state === "idle" && see_player()) { transition("chase"); }
//!   if (state === "chase") { move_towards_player(); }
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Engine:** [`ScriptEngine`] / [`ScriptInstance`] hide the interpreter.
//!   QuickJS is the default; builds without the `quickjs` feature use
//!   [`NullScriptEngine`] and reject scripted entities at load time.
//! - **Bridge:** [`HostBridge`] snapshots the entity and records commands.
//! - **Driver:** [`ScriptDriver`] caches one interpreter per entity and plugs
//!   into `gloam_ai::AiSystem` as its `ScriptBackend`.

pub mod bridge;
pub mod driver;
pub mod engine;
pub mod error;
#[cfg(feature = "quickjs")]
pub mod quickjs;
#[cfg(feature = "quickjs")]
pub mod runtime;

pub use bridge::{HostBridge, ScriptCommand, ScriptFrame};
pub use driver::ScriptDriver;
pub use engine::{default_engine, LifecyclePhase, NullScriptEngine, ScriptEngine, ScriptInstance};
pub use error::ScriptError;
#[cfg(feature = "quickjs")]
pub use quickjs::QuickJsEngine;
#[cfg(feature = "quickjs")]
pub use rquickjs;
