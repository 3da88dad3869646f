//! Data-driven AI for gloam.
//!
//! Behavior specs (JSON) are compiled by [`FsmCompiler`] into [`FsmDef`]s
//! against an [`ActionRegistry`] and a [`CheckerRegistry`]. Each tick,
//! [`AiSystem`] advances the optional [`AiPhaseController`] and then either
//! steps the compiled FSM or hands the entity to a [`ScriptBackend`].
//! [`NavigationSystem`] keeps [`PathAgent`] waypoints fresh using the grid
//! A* in [`pathfinding`].

pub mod action;
pub mod checker;
pub mod components;
pub mod context;
pub mod error;
pub mod fsm;
pub mod machine;
pub mod navigation;
pub mod pathfinding;
pub mod phase;
pub mod spec;
pub mod systems;

pub use action::{Action, ActionRegistry};
pub use checker::{Checker, CheckerRegistry};
pub use components::*;
pub use context::{AiActionContext, AiHost, CheckerFacts, WorldHost};
pub use error::{ActionError, SpecError};
pub use fsm::{FsmCompiler, FsmDef, StateDef, TransitionRule, TransitionTable};
pub use machine::{TickOutcome, Transition};
pub use navigation::{NavigationSystem, PathAgent};
pub use pathfinding::{find_path, find_world_path, GridLayout, GridPos, OccupancyGrid};
pub use phase::{AiPhaseController, AiPhaseRuntime, PhaseCondition, PhaseDef, PhaseFacts};
pub use spec::FsmSpec;
pub use systems::{player_position, AiSystem, CooldownSystem, ScriptBackend};
