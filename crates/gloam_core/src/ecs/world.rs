// world.rs - ECS World with entity management and iteration

use crate::ecs::{Component, ComponentId, ComponentKind, ComponentStore, Entity, EntityStore, ErasedStore};
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the component API. Both are recoverable: callers
/// usually skip the entity for this tick.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("entity {entity} is not alive")]
    EntityNotAlive { entity: Entity },

    #[error("component kind for {type_name} was never registered")]
    InvalidComponentKind { type_name: &'static str },
}

/// The main ECS world containing all entities and components.
pub struct World {
    entities: EntityStore,
    stores: HashMap<ComponentId, Box<dyn ErasedStore>>,
    // Reused driver index buffer for `for_each*`.
    scratch: Vec<u32>,
}

impl World {
    /// Create a new empty world.
    pub fn new() -> Self {
        Self {
            entities: EntityStore::new(),
            stores: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    /// Allocate a new entity with no components.
    pub fn create(&mut self) -> Entity {
        self.entities.create()
    }

    /// Destroy an entity, dropping all of its components.
    ///
    /// Stale handles are ignored and return false, so several systems may
    /// request the same destruction within one tick.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.entities.destroy(entity) {
            return false;
        }
        for store in self.stores.values_mut() {
            store.purge(entity.index());
        }
        tracing::trace!(%entity, "entity destroyed");
        true
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate all live entities.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    fn check<T>(&self, entity: Entity, kind: ComponentKind<T>) -> Result<(), WorldError> {
        if !kind.is_valid() {
            return Err(WorldError::InvalidComponentKind {
                type_name: kind.type_name(),
            });
        }
        if !self.entities.is_alive(entity) {
            return Err(WorldError::EntityNotAlive { entity });
        }
        Ok(())
    }

    /// Attach `value` to `entity`, overwriting any previous value.
    ///
    /// The store for `kind` is created on first use.
    pub fn add<T: Component>(
        &mut self,
        entity: Entity,
        kind: ComponentKind<T>,
        value: T,
    ) -> Result<(), WorldError> {
        self.check(entity, kind)?;
        let store = self
            .stores
            .entry(kind.id())
            .or_insert_with(|| Box::new(ComponentStore::<T>::new()));
        match store.as_any_mut().downcast_mut::<ComponentStore<T>>() {
            Some(store) => {
                store.insert(entity.index(), value);
                Ok(())
            }
            None => Err(WorldError::InvalidComponentKind {
                type_name: kind.type_name(),
            }),
        }
    }

    /// Shorthand for [`add`](Self::add) with the type's own kind.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), WorldError> {
        self.add(entity, ComponentKind::<T>::of(), value)
    }

    /// Detach and return the value, or `None` if the entity did not have one.
    pub fn remove<T: Component>(
        &mut self,
        entity: Entity,
        kind: ComponentKind<T>,
    ) -> Result<Option<T>, WorldError> {
        self.check(entity, kind)?;
        Ok(self
            .store_mut(kind)
            .and_then(|store| store.remove(entity.index())))
    }

    /// Get a component. Stale entities and missing values read as `None`.
    pub fn get<T: Component>(&self, entity: Entity, kind: ComponentKind<T>) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.store(kind)?.get(entity.index())
    }

    pub fn get_mut<T: Component>(
        &mut self,
        entity: Entity,
        kind: ComponentKind<T>,
    ) -> Option<&mut T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.store_mut(kind)?.get_mut(entity.index())
    }

    pub fn has<T: Component>(&self, entity: Entity, kind: ComponentKind<T>) -> bool {
        self.get(entity, kind).is_some()
    }

    /// Typed access to the store for `kind`, if one has been created.
    pub fn store<T: Component>(&self, kind: ComponentKind<T>) -> Option<&ComponentStore<T>> {
        self.stores
            .get(&kind.id())?
            .as_any()
            .downcast_ref::<ComponentStore<T>>()
    }

    fn store_mut<T: Component>(&mut self, kind: ComponentKind<T>) -> Option<&mut ComponentStore<T>> {
        self.stores
            .get_mut(&kind.id())?
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
    }

    /// Number of entities holding `kind`.
    pub fn count<T: Component>(&self, kind: ComponentKind<T>) -> usize {
        self.stores.get(&kind.id()).map_or(0, |store| store.len())
    }

    /// Snapshot of the live entities holding `kind`, in dense order.
    ///
    /// Systems that need the whole world while visiting each entity
    /// collect with this first and then look components up individually.
    pub fn entities_with<T: Component>(&self, kind: ComponentKind<T>) -> Vec<Entity> {
        self.store(kind).map_or_else(Vec::new, |store| {
            store
                .indices()
                .iter()
                .filter_map(|&index| self.entities.entity_at(index))
                .collect()
        })
    }

    /// Read-only iteration over one kind.
    pub fn iter<T: Component>(&self, kind: ComponentKind<T>) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.store(kind)
            .into_iter()
            .flat_map(|store| store.iter())
            .filter_map(|(index, value)| self.entities.entity_at(index).map(|e| (e, value)))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates `for_eachN`: take the N stores out of the map, drive from the
/// smallest, and hand every entity present in all of them to the callback.
///
/// A kind listed twice, or a kind with no store yet, visits nothing.
macro_rules! impl_for_each {
    ($(#[$doc:meta])* $name:ident; $($T:ident, $kind:ident, $store:ident, $value:ident);+) => {
        $(#[$doc])*
        pub fn $name<$($T: Component,)+ F>(&mut self, $($kind: ComponentKind<$T>,)+ mut f: F)
        where
            F: FnMut(Entity, $(&mut $T),+),
        {
            let ids = [$($kind.id()),+];
            let mut taken = [$(self.stores.remove(&$kind.id())),+];
            let mut driver = std::mem::take(&mut self.scratch);

            'query: {
                let [$(Some($store)),+] = &mut taken else {
                    break 'query;
                };
                let sources = [$($store.indices()),+];
                let Some(smallest) = sources.iter().min_by_key(|indices| indices.len()) else {
                    break 'query;
                };
                driver.clear();
                driver.extend_from_slice(smallest);

                $(
                    let Some($store) = $store.as_any_mut().downcast_mut::<ComponentStore<$T>>() else {
                        break 'query;
                    };
                )+

                for &index in &driver {
                    let Some(entity) = self.entities.entity_at(index) else {
                        continue;
                    };
                    if let ($(Some($value),)+) = ($($store.get_mut(index),)+) {
                        f(entity, $($value),+);
                    }
                }
            }

            self.scratch = driver;
            for (id, store) in ids.into_iter().zip(taken) {
                if let Some(store) = store {
                    self.stores.insert(id, store);
                }
            }
        }
    };
}

impl World {
    impl_for_each!(
        /// Visit every live entity holding `k1`.
        for_each; A, k1, s1, v1
    );
    impl_for_each!(
        /// Visit every live entity holding both kinds.
        for_each2; A, k1, s1, v1; B, k2, s2, v2
    );
    impl_for_each!(
        /// Visit every live entity holding all three kinds.
        for_each3; A, k1, s1, v1; B, k2, s2, v2; C, k3, s3, v3
    );
    impl_for_each!(
        /// Visit every live entity holding all four kinds.
        for_each4; A, k1, s1, v1; B, k2, s2, v2; C, k3, s3, v3; D, k4, s4, v4
    );
}
