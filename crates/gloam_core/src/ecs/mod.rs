//! Entity Component System core types.
//!
//! Entities are generational handles from [`EntityStore`]. Each component
//! type gets a [`ComponentKind`] whose id selects one sparse-set
//! [`ComponentStore`] inside the [`World`]. Multi-component iteration
//! (`World::for_each2`..`for_each4`) drives from the smallest store and
//! probes the others, so cost scales with the rarest component.
//!
//! The world is single-threaded and owned by whichever system is running.

mod component;
mod entity;
mod storage;
mod world;

pub use component::{meta_of, Component, ComponentId, ComponentKind, ComponentMeta, INVALID_COMPONENT_ID};
pub use entity::{Entity, EntityStore};
pub use storage::{ComponentStore, ErasedStore};
pub use world::{World, WorldError};

/// Create an entity and insert each component under its type's own kind.
///
/// Evaluates to `Result<Entity, WorldError>`; on failure the entity stays
/// alive with whatever components were inserted before the error.
///
/// # Example
/// ```ignore
/// let enemy = spawn!(world, Position(Vec2::ZERO), Velocity::default())?;
/// ```
#[macro_export]
macro_rules! spawn {
    ($world:expr $(, $component:expr)+ $(,)?) => {{
        let entity: $crate::ecs::Entity = $world.create();
        let mut result: ::std::result::Result<$crate::ecs::Entity, $crate::ecs::WorldError> = Ok(entity);
        $(
            if result.is_ok() {
                if let Err(err) = $world.insert(entity, $component) {
                    result = Err(err);
                }
            }
        )+
        result
    }};
}
