//! # World
//!
//! Composition root for component storage.
//!
//! Frame jobs share the registry through a read lock: component values change
//! through the versioned caches, which never need exclusive access. Spawning,
//! despawning and inserting change the dense arrays themselves and take the
//! write lock.
//!
//! Lock order is always entities first, components second.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use tessera_core::{
    Component, ComponentArray, ComponentRegistry, Entity, EntityAllocator, Position, Velocity,
    DEFAULT_SLOTS,
};

use crate::error::{TesseraError, TesseraResult};

/// Entities plus their components.
///
/// # Example
///
/// ```rust
/// use tessera::World;
/// use tessera::core::{Position, Velocity};
///
/// let world = World::new(16);
/// let e = world.spawn().unwrap();
/// world.insert(e, Position::new(0.0, 0.0, 0.0)).unwrap();
/// world.insert(e, Velocity::new(1.0, 0.0, 0.0)).unwrap();
///
/// assert_eq!(world.components().signature(e), 0b11);
/// ```
pub struct World {
    entities: Mutex<EntityAllocator>,
    components: RwLock<ComponentRegistry>,
}

impl World {
    /// Creates a world for `capacity` entities with `Position` and
    /// `Velocity` arrays registered.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let world = Self::empty(capacity);
        {
            let mut components = world.components.write();
            // Fresh registry, neither type can be present yet.
            let _ = components.register(ComponentArray::<Position>::with_capacity(capacity));
            let _ = components.register(ComponentArray::<Velocity>::with_capacity(capacity));
        }
        world
    }

    /// Creates a world with no component array registered.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn empty(capacity: usize) -> Self {
        debug!(capacity, "world created");
        Self {
            entities: Mutex::new(EntityAllocator::new(capacity)),
            components: RwLock::new(ComponentRegistry::new()),
        }
    }

    /// Registers an array for another component type.
    ///
    /// # Errors
    ///
    /// Returns [`tessera_core::EcsError::AlreadyRegistered`] if `C` has one.
    pub fn register<C: Component, const N: usize>(
        &self,
        array: ComponentArray<C, N>,
    ) -> TesseraResult<()> {
        self.components.write().register(array)?;
        Ok(())
    }

    /// Allocates a new entity holding no components.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::EntitiesExhausted`] when every index is alive.
    pub fn spawn(&self) -> TesseraResult<Entity> {
        let mut entities = self.entities.lock();
        let entity = entities.allocate().ok_or(TesseraError::EntitiesExhausted {
            capacity: entities.capacity(),
        })?;
        trace!(%entity, "entity spawned");
        Ok(entity)
    }

    /// Frees `entity` and drops its components from every array.
    ///
    /// Returns `false` if the entity was already dead.
    pub fn despawn(&self, entity: Entity) -> bool {
        let mut entities = self.entities.lock();
        if !entities.free(entity) {
            return false;
        }
        self.components.write().entity_destroyed(entity);
        trace!(%entity, "entity despawned");
        true
    }

    /// Checks whether `entity` is alive.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.lock().is_alive(entity)
    }

    /// Number of alive entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.lock().alive_count()
    }

    /// Adds a component to a live entity.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::DeadEntity`] if `entity` is not alive
    /// - [`tessera_core::EcsError::NotRegistered`] if `C` has no array
    /// - [`tessera_core::EcsError::DuplicateComponent`] if it already holds one
    /// - [`tessera_core::EcsError::CapacityExceeded`] if the array is full
    pub fn insert<C: Component>(&self, entity: Entity, value: C) -> TesseraResult<()> {
        let entities = self.entities.lock();
        if !entities.is_alive(entity) {
            return Err(TesseraError::DeadEntity(entity));
        }
        self.components
            .write()
            .get_mut::<C, DEFAULT_SLOTS>()?
            .insert(entity, value)?;
        drop(entities);
        Ok(())
    }

    /// Removes a component from an entity.
    ///
    /// # Errors
    ///
    /// - [`tessera_core::EcsError::NotRegistered`] if `C` has no array
    /// - [`tessera_core::EcsError::MissingComponent`] if the entity holds none
    pub fn remove<C: Component>(&self, entity: Entity) -> TesseraResult<()> {
        self.components
            .write()
            .get_mut::<C, DEFAULT_SLOTS>()?
            .remove(entity)?;
        Ok(())
    }

    /// Copies the latest published value of a component.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentArray::get`], plus
    /// [`tessera_core::EcsError::NotRegistered`].
    pub fn get<C: Component>(&self, entity: Entity) -> TesseraResult<C> {
        Ok(self.components.read().get::<C, DEFAULT_SLOTS>()?.get(entity)?)
    }

    /// Publishes a new value of a component.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentArray::set`], plus
    /// [`tessera_core::EcsError::NotRegistered`].
    pub fn set<C: Component>(&self, entity: Entity, value: C) -> TesseraResult<()> {
        self.components
            .read()
            .get::<C, DEFAULT_SLOTS>()?
            .set(entity, value)?;
        Ok(())
    }

    /// Entities holding both `A` and `B`, in `A`'s dense order.
    #[must_use]
    pub fn query2<A: Component, B: Component>(&self) -> Vec<Entity> {
        let components = self.components.read();
        let Ok(first) = components.get::<A, DEFAULT_SLOTS>() else {
            return Vec::new();
        };
        first
            .entities()
            .iter()
            .copied()
            .filter(|&entity| components.has::<B>(entity))
            .collect()
    }

    /// Shared access to the registry, for frame jobs.
    pub fn components(&self) -> RwLockReadGuard<'_, ComponentRegistry> {
        self.components.read()
    }

    /// Exclusive access to the registry.
    pub fn components_mut(&self) -> RwLockWriteGuard<'_, ComponentRegistry> {
        self.components.write()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("components", &*self.components.read())
            .finish()
    }
}
