// storage.rs - Sparse-set component storage
//
// One store per component kind. `sparse` maps entity index -> dense slot,
// `dense` holds the owning entity index per slot and `data` holds the values
// in the same order. Removal swaps the last slot into the hole.

use std::any::Any;

/// Sentinel marking an entity index with no value in this store.
const EMPTY: u32 = u32::MAX;

/// Sparse set of `T` keyed by entity index.
pub struct ComponentStore<T> {
    sparse: Vec<u32>,
    dense: Vec<u32>,
    data: Vec<T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentStore<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    #[inline]
    fn slot(&self, index: u32) -> Option<usize> {
        match self.sparse.get(index as usize) {
            Some(&slot) if slot != EMPTY => Some(slot as usize),
            _ => None,
        }
    }

    /// Insert or overwrite the value for `index`. Returns the previous value.
    pub fn insert(&mut self, index: u32, value: T) -> Option<T> {
        debug_assert_ne!(index, EMPTY, "entity index u32::MAX is reserved");
        if let Some(slot) = self.slot(index) {
            return Some(std::mem::replace(&mut self.data[slot], value));
        }

        let i = index as usize;
        if i >= self.sparse.len() {
            self.sparse.resize(i + 1, EMPTY);
        }
        self.sparse[i] = self.dense.len() as u32;
        self.dense.push(index);
        self.data.push(value);
        None
    }

    /// Remove the value for `index` in O(1) by swapping in the last slot.
    pub fn remove(&mut self, index: u32) -> Option<T> {
        let slot = self.slot(index)?;
        let last = self.dense.len() - 1;

        self.dense.swap_remove(slot);
        let value = self.data.swap_remove(slot);
        if slot != last {
            let moved = self.dense[slot];
            self.sparse[moved as usize] = slot as u32;
        }
        self.sparse[index as usize] = EMPTY;
        Some(value)
    }

    #[inline]
    pub fn contains(&self, index: u32) -> bool {
        self.slot(index).is_some()
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slot(index).map(|slot| &self.data[slot])
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slot(index).map(move |slot| &mut self.data[slot])
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Entity indices in dense order.
    pub fn indices(&self) -> &[u32] {
        &self.dense
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.dense.iter().copied().zip(self.data.iter())
    }

    /// Check the sparse/dense invariants. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        self.dense.len() == self.data.len()
            && self
                .dense
                .iter()
                .enumerate()
                .all(|(slot, &index)| self.sparse.get(index as usize) == Some(&(slot as u32)))
            && self
                .sparse
                .iter()
                .filter(|&&slot| slot != EMPTY)
                .count()
                == self.dense.len()
    }
}

/// Type-erased view of a store, held by the world's kind map.
pub trait ErasedStore: Any {
    /// Drop the value for `index`, if any. Returns whether one was present.
    fn purge(&mut self, index: u32) -> bool;
    fn contains(&self, index: u32) -> bool;
    /// Entity indices in dense order.
    fn indices(&self) -> &[u32];
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedStore for ComponentStore<T> {
    fn purge(&mut self, index: u32) -> bool {
        self.remove(index).is_some()
    }

    fn contains(&self, index: u32) -> bool {
        ComponentStore::contains(self, index)
    }

    fn indices(&self) -> &[u32] {
        ComponentStore::indices(self)
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut store = ComponentStore::new();
        assert_eq!(store.insert(4, "a"), None);
        assert_eq!(store.insert(4, "b"), Some("a"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(4), Some(&"b"));
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut store = ComponentStore::new();
        store.insert(1, 10);
        store.insert(2, 20);
        store.insert(3, 30);

        assert_eq!(store.remove(1), Some(10));
        assert_eq!(store.indices(), &[3, 2]);
        assert_eq!(store.get(3), Some(&30));
        assert_eq!(store.get(2), Some(&20));
        assert_eq!(store.remove(1), None);
        assert!(store.is_consistent());
    }

    #[test]
    fn remove_last_element() {
        let mut store = ComponentStore::new();
        store.insert(0, 'x');
        assert_eq!(store.remove(0), Some('x'));
        assert!(store.is_empty());
        assert!(!store.contains(0));
        assert!(store.is_consistent());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u32, i64),
        Remove(u32),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..64, any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
            (0u32..64).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn sparse_set_matches_reference_map(ops in prop::collection::vec(op(), 0..200)) {
            let mut store = ComponentStore::new();
            let mut reference = std::collections::HashMap::new();
            for op in ops {
                match op {
                    Op::Insert(i, v) => {
                        prop_assert_eq!(store.insert(i, v), reference.insert(i, v));
                    }
                    Op::Remove(i) => {
                        prop_assert_eq!(store.remove(i), reference.remove(&i));
                    }
                }
                prop_assert!(store.is_consistent());
                prop_assert_eq!(store.len(), reference.len());
            }
            for (i, v) in &reference {
                prop_assert_eq!(store.get(*i), Some(v));
            }
        }
    }
}
