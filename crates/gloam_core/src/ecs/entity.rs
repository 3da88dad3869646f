//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that reference data in the World.
//! The generation counter prevents use-after-free bugs.

use serde::{Deserialize, Serialize};

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: slot in the entity store, recycled after destruction
/// - Generation: incremented on destruction, invalidating every copy of the handle
///
/// Example:
/// ```ignore
/// let entity = world.create();
/// world.destroy(entity);
/// // entity handle is now invalid (generation mismatch)
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to 64-bit integer (for logging and script handles)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates and recycles entity ids.
///
/// An entity is alive iff its generation matches the slot's current
/// generation and the slot is occupied. Freed ids are reused LIFO.
#[derive(Debug, Default)]
pub struct EntityStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive_count: usize,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh or recycled id with its current generation.
    pub fn create(&mut self) -> Entity {
        self.alive_count += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        Entity::new(index, 0)
    }

    /// Release an entity. Returns false for stale handles, which are ignored.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index);
        self.alive_count -= 1;
        true
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    /// Resolve the live handle currently occupying `index`, if any.
    #[inline]
    pub fn entity_at(&self, index: u32) -> Option<Entity> {
        self.slots
            .get(index as usize)
            .filter(|slot| slot.alive)
            .map(|slot| Entity::new(index, slot.generation))
    }

    pub fn len(&self) -> usize {
        self.alive_count
    }

    pub fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    /// Iterate every live entity in index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_invalidates_and_recycles() {
        let mut store = EntityStore::new();
        let a = store.create();
        assert!(store.is_alive(a));

        assert!(store.destroy(a));
        assert!(!store.is_alive(a));
        assert!(!store.destroy(a), "second destroy is a no-op");

        let b = store.create();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(store.is_alive(b));
        assert!(!store.is_alive(a));
    }

    #[test]
    fn bits_round_trip() {
        let e = Entity::new(7, 3);
        assert_eq!(Entity::from_bits(e.to_bits()), e);
    }

    #[test]
    fn entity_at_skips_free_slots() {
        let mut store = EntityStore::new();
        let a = store.create();
        let b = store.create();
        store.destroy(a);
        assert_eq!(store.entity_at(a.index()), None);
        assert_eq!(store.entity_at(b.index()), Some(b));
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![b]);
    }
}
