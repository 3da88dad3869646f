// component.rs - Runtime component kind registration
//
// Every Rust component type receives a numeric kind id the first time it is
// used. Ids come from a process-wide counter, so two types never collide and
// id 0 stays reserved for "not a real kind".

use once_cell::sync::Lazy;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

pub type ComponentId = u32;

/// Kind id reserved for default-constructed (invalid) kinds.
pub const INVALID_COMPONENT_ID: ComponentId = 0;

/// Metadata describing a registered component kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: &'static str,
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Type → kind id, so repeated lookups for one type agree.
static KINDS: Lazy<RwLock<HashMap<TypeId, ComponentId>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Kind id → metadata, for diagnostics.
static REGISTRY: Lazy<RwLock<HashMap<ComponentId, ComponentMeta>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn register<T: 'static>() -> ComponentId {
    let type_id = TypeId::of::<T>();
    if let Some(&id) = KINDS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&type_id)
    {
        return id;
    }

    let mut kinds = KINDS.write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have registered between the read and write locks.
    let id = *kinds
        .entry(type_id)
        .or_insert_with(|| NEXT_ID.fetch_add(1, Ordering::Relaxed));
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(id)
        .or_insert(ComponentMeta {
            id,
            name: type_name::<T>(),
        });
    id
}

/// Look up component metadata by kind id.
pub fn meta_of(id: ComponentId) -> Option<ComponentMeta> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&id)
        .cloned()
}

/// Marker for types that can be stored in the world.
///
/// Implemented for every `'static` type; the world is single-threaded so
/// no `Send`/`Sync` bound is required.
pub trait Component: 'static {
    /// The kind token for this type.
    fn kind() -> ComponentKind<Self>
    where
        Self: Sized,
    {
        ComponentKind::of()
    }
}

impl<T: 'static> Component for T {}

/// Typed tag carrying the runtime kind id of `T`.
///
/// `ComponentKind::default()` produces the invalid kind (id 0), which the
/// world rejects with `WorldError::InvalidComponentKind`.
pub struct ComponentKind<T> {
    id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> ComponentKind<T> {
    /// Kind for `T`, allocating its id on first use.
    pub fn of() -> Self {
        Self {
            id: register::<T>(),
            _marker: PhantomData,
        }
    }
}

impl<T> ComponentKind<T> {
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id != INVALID_COMPONENT_ID
    }

    pub fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl<T> Default for ComponentKind<T> {
    fn default() -> Self {
        Self {
            id: INVALID_COMPONENT_ID,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ComponentKind<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentKind<T> {}

impl<T> PartialEq for ComponentKind<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ComponentKind<T> {}

impl<T> Hash for ComponentKind<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for ComponentKind<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentKind")
            .field("id", &self.id)
            .field("type", &type_name::<T>())
            .finish()
    }
}
