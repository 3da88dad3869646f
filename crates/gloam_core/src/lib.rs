//! Gloam Engine Core
//!
//! Contains the fundamental simulation systems:
//! - Entity Component System (ECS) with sparse-set storage
//! - Deterministic fixed-step time
//! - 2D math helpers

pub mod ecs;
pub mod math;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
