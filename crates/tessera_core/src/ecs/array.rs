//! # Dense Component Array
//!
//! Packed per-type component storage with swap-remove deletion.
//!
//! Every stored component lives in its own [`VersionedCache`], so tasks on
//! different threads can read and write components of the same array while
//! the array itself is only borrowed immutably.
//!
//! ```text
//!   caches:           [ c0 ][ c1 ][ c2 ][ c3 ]     dense, no holes
//!   index_to_entity:  [ e7 ][ e2 ][ e9 ][ e4 ]
//!   entity_to_index:  e7->0  e2->1  e9->2  e4->3
//!
//!   remove(e2):  c3 moves into slot 1, e4->1, length 3
//! ```

use std::collections::HashMap;

use tracing::trace;

use super::component::Component;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::sync::{ReadHandle, VersionedCache, WriteHandle};

/// Default capacity of a component array.
pub const MAX_COMPONENTS_PER_ARRAY: usize = 5000;

/// Default number of versioned slots per stored component.
pub const DEFAULT_SLOTS: usize = 2;

/// Dense storage for one component type.
///
/// # Invariants
///
/// - Indices `0..len()` are all occupied, there are no holes.
/// - `entity_to_index` and `index_to_entity` are exact inverses.
/// - An entity holds at most one component of this type.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentArray, Entity, Position};
///
/// let mut positions: ComponentArray<Position> = ComponentArray::new();
/// let e = Entity::new(0, 0);
///
/// positions.insert(e, Position::new(1.0, 2.0, 3.0)).unwrap();
/// assert_eq!(positions.get(e).unwrap().0.x, 1.0);
///
/// positions.set(e, Position::new(4.0, 5.0, 6.0)).unwrap();
/// assert_eq!(positions.get(e).unwrap().0.x, 4.0);
/// ```
pub struct ComponentArray<C: Component, const N: usize = DEFAULT_SLOTS> {
    /// Versioned storage, one cache per stored component.
    caches: Vec<VersionedCache<C, N>>,
    entity_to_index: HashMap<Entity, usize>,
    index_to_entity: Vec<Entity>,
    capacity: usize,
}

impl<C: Component, const N: usize> ComponentArray<C, N> {
    /// Creates an empty array with [`MAX_COMPONENTS_PER_ARRAY`] capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_COMPONENTS_PER_ARRAY)
    }

    /// Creates an empty array holding at most `capacity` components.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        Self {
            caches: Vec::with_capacity(capacity),
            entity_to_index: HashMap::with_capacity(capacity),
            index_to_entity: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Component type name used in errors and logs.
    #[inline]
    #[must_use]
    pub fn component_name() -> &'static str {
        std::any::type_name::<C>()
    }

    /// Returns the number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Returns true if no component is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Returns the maximum number of stored components.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks whether `entity` holds this component.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.entity_to_index.contains_key(&entity)
    }

    /// Stores `value` for `entity` and publishes it.
    ///
    /// Returns the dense index the component landed at.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateComponent`] if the entity already holds one
    /// - [`EcsError::CapacityExceeded`] if the array is full
    pub fn insert(&mut self, entity: Entity, value: C) -> EcsResult<usize> {
        if self.has(entity) {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: Self::component_name(),
            });
        }
        if self.len() >= self.capacity {
            return Err(EcsError::CapacityExceeded {
                component: Self::component_name(),
                capacity: self.capacity,
            });
        }

        let cache = VersionedCache::new();
        // Nobody else can see the cache yet, the first claim always succeeds.
        let published = cache.write(value);
        debug_assert!(published);

        let index = self.caches.len();
        self.caches.push(cache);
        self.index_to_entity.push(entity);
        self.entity_to_index.insert(entity, index);

        trace!(%entity, index, component = Self::component_name(), "component inserted");
        Ok(index)
    }

    /// Removes the component of `entity`, keeping the array dense.
    ///
    /// The last element is moved into the vacated index.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::MissingComponent`] if the entity holds none.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        let removed = self
            .entity_to_index
            .remove(&entity)
            .ok_or(EcsError::MissingComponent {
                entity,
                component: Self::component_name(),
            })?;

        // The cache object itself moves, slots and versions travel with it.
        self.caches.swap_remove(removed);
        self.index_to_entity.swap_remove(removed);

        if let Some(&moved) = self.index_to_entity.get(removed) {
            self.entity_to_index.insert(moved, removed);
            trace!(%entity, %moved, index = removed, "component removed, last element moved");
        } else {
            trace!(%entity, index = removed, "component removed from the end");
        }
        Ok(())
    }

    /// Removes the component of a destroyed entity, if it holds one.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        if self.has(entity) {
            // Cannot fail, presence checked above.
            let _ = self.remove(entity);
        }
    }

    /// Returns the versioned cache of `entity`'s component.
    #[inline]
    #[must_use]
    pub fn cache(&self, entity: Entity) -> Option<&VersionedCache<C, N>> {
        self.entity_to_index.get(&entity).map(|&i| &self.caches[i])
    }

    /// Acquires shared access to the newest published component of `entity`.
    ///
    /// # Errors
    ///
    /// - [`EcsError::MissingComponent`] if the entity holds none
    /// - [`EcsError::NotPublished`] if no slot is readable right now
    pub fn read(&self, entity: Entity) -> EcsResult<ReadHandle<'_, C, N>> {
        self.cache_or_missing(entity)?
            .read()
            .ok_or(EcsError::NotPublished {
                entity,
                component: Self::component_name(),
            })
    }

    /// Claims a slot of `entity`'s component for writing.
    ///
    /// The new value is published when the handle is dropped.
    ///
    /// # Errors
    ///
    /// - [`EcsError::MissingComponent`] if the entity holds none
    /// - [`EcsError::NoWritableSlot`] if every slot is busy right now
    pub fn write(&self, entity: Entity) -> EcsResult<WriteHandle<'_, C, N>> {
        self.cache_or_missing(entity)?
            .write_handle()
            .ok_or(EcsError::NoWritableSlot {
                entity,
                component: Self::component_name(),
            })
    }

    /// Returns a copy of the newest published component of `entity`.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentArray::read`].
    #[inline]
    pub fn get(&self, entity: Entity) -> EcsResult<C> {
        self.read(entity).map(|handle| *handle)
    }

    /// Writes and publishes a new component value for `entity`.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentArray::write`].
    #[inline]
    pub fn set(&self, entity: Entity, value: C) -> EcsResult<()> {
        let mut handle = self.write(entity)?;
        *handle = value;
        Ok(())
    }

    /// Returns the dense index of `entity`'s component.
    #[inline]
    #[must_use]
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.entity_to_index.get(&entity).copied()
    }

    /// Returns the entity owning the component at dense `index`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.index_to_entity.get(index).copied()
    }

    /// Returns all entities holding this component, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.index_to_entity
    }

    fn cache_or_missing(&self, entity: Entity) -> EcsResult<&VersionedCache<C, N>> {
        self.cache(entity).ok_or(EcsError::MissingComponent {
            entity,
            component: Self::component_name(),
        })
    }
}

impl<C: Component, const N: usize> Default for ComponentArray<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component, const N: usize> std::fmt::Debug for ComponentArray<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentArray")
            .field("component", &Self::component_name())
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Position;

    fn pos(x: f32) -> Position {
        Position::new(x, 0.0, 0.0)
    }

    fn assert_dense<C: Component, const N: usize>(array: &ComponentArray<C, N>) {
        assert_eq!(array.entities().len(), array.len());
        for (index, &entity) in array.entities().iter().enumerate() {
            assert_eq!(array.index_of(entity), Some(index));
        }
    }

    #[test]
    fn test_insert_and_read() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let e = Entity::new(4, 0);

        assert_eq!(array.insert(e, pos(1.5)).unwrap(), 0);
        assert!(array.has(e));
        assert_eq!(array.len(), 1);
        assert_eq!(array.get(e).unwrap(), pos(1.5));
        assert_eq!(array.capacity(), MAX_COMPONENTS_PER_ARRAY);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let e = Entity::new(1, 0);
        array.insert(e, pos(1.0)).unwrap();

        let err = array.insert(e, pos(2.0)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { .. }));
        assert_eq!(array.get(e).unwrap(), pos(1.0));
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut array: ComponentArray<Position> = ComponentArray::with_capacity(2);
        array.insert(Entity::new(0, 0), pos(0.0)).unwrap();
        array.insert(Entity::new(1, 0), pos(1.0)).unwrap();

        let err = array.insert(Entity::new(2, 0), pos(2.0)).unwrap_err();
        assert_eq!(
            err,
            EcsError::CapacityExceeded {
                component: ComponentArray::<Position>::component_name(),
                capacity: 2,
            }
        );
    }

    #[test]
    fn test_remove_moves_last_into_hole() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let entities: Vec<_> = (0..4).map(|i| Entity::new(i, 0)).collect();
        for (i, &e) in entities.iter().enumerate() {
            array.insert(e, pos(i as f32)).unwrap();
        }

        array.remove(entities[1]).unwrap();

        assert_eq!(array.len(), 3);
        assert!(!array.has(entities[1]));
        assert_eq!(array.index_of(entities[3]), Some(1));
        assert_eq!(array.entity_at(1), Some(entities[3]));
        // The moved component kept its value.
        assert_eq!(array.get(entities[3]).unwrap(), pos(3.0));
        assert_dense(&array);
    }

    #[test]
    fn test_remove_last_element() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        array.insert(a, pos(0.0)).unwrap();
        array.insert(b, pos(1.0)).unwrap();

        array.remove(b).unwrap();

        assert_eq!(array.entities(), &[a]);
        assert_dense(&array);
    }

    #[test]
    fn test_missing_component_errors() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let e = Entity::new(9, 0);

        assert!(matches!(array.remove(e), Err(EcsError::MissingComponent { .. })));
        assert!(matches!(array.read(e), Err(EcsError::MissingComponent { .. })));
        assert!(matches!(array.write(e), Err(EcsError::MissingComponent { .. })));
    }

    #[test]
    fn test_on_entity_destroyed_is_idempotent() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let e = Entity::new(2, 0);
        array.insert(e, pos(2.0)).unwrap();

        array.on_entity_destroyed(e);
        array.on_entity_destroyed(e);

        assert!(array.is_empty());
    }

    #[test]
    fn test_write_handle_publishes_on_drop() {
        let mut array: ComponentArray<Position> = ComponentArray::new();
        let e = Entity::new(0, 0);
        array.insert(e, pos(1.0)).unwrap();

        {
            let mut handle = array.write(e).unwrap();
            handle.0.x = 10.0;
            // Still reading the old value while the write is in flight.
            assert_eq!(array.get(e).unwrap(), pos(1.0));
        }
        assert_eq!(array.get(e).unwrap(), pos(10.0));
    }

    #[test]
    fn test_no_writable_slot_with_single_slot_reader() {
        let mut array: ComponentArray<Position, 1> = ComponentArray::new();
        let e = Entity::new(0, 0);
        array.insert(e, pos(1.0)).unwrap();

        let reader = array.read(e).unwrap();
        assert!(matches!(array.set(e, pos(2.0)), Err(EcsError::NoWritableSlot { .. })));
        drop(reader);

        array.set(e, pos(2.0)).unwrap();
        assert_eq!(array.get(e).unwrap(), pos(2.0));
    }
}
