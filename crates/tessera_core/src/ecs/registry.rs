//! # Component Registry
//!
//! Owns one [`ComponentArray`] per component type and forwards entity
//! destruction to all of them.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tracing::debug;

use super::array::ComponentArray;
use super::component::Component;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Type-erased view of a component array.
pub trait ComponentStore: Any + Send + Sync {
    /// Component type name.
    fn component_name(&self) -> &'static str;

    /// Component signature bit, `1 << ID`.
    fn component_bit(&self) -> u64;

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Returns true if no component is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks whether `entity` holds a component in this store.
    fn has(&self, entity: Entity) -> bool;

    /// Removes `entity`'s component if present.
    fn on_entity_destroyed(&mut self, entity: Entity);

    /// Upcast for downcasting to the concrete array.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete array.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component, const N: usize> ComponentStore for ComponentArray<C, N> {
    fn component_name(&self) -> &'static str {
        Self::component_name()
    }

    fn component_bit(&self) -> u64 {
        C::BIT
    }

    fn len(&self) -> usize {
        ComponentArray::len(self)
    }

    fn has(&self, entity: Entity) -> bool {
        ComponentArray::has(self, entity)
    }

    fn on_entity_destroyed(&mut self, entity: Entity) {
        ComponentArray::on_entity_destroyed(self, entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One component array per registered component type.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentArray, ComponentRegistry, Entity, Position};
///
/// let mut registry = ComponentRegistry::new();
/// registry.register(ComponentArray::<Position>::new()).unwrap();
///
/// let e = Entity::new(0, 0);
/// registry.get_mut::<Position, 2>().unwrap().insert(e, Position::default()).unwrap();
/// assert!(registry.has::<Position>(e));
///
/// registry.entity_destroyed(e);
/// assert!(!registry.has::<Position>(e));
/// ```
#[derive(Default)]
pub struct ComponentRegistry {
    stores: HashMap<TypeId, Box<dyn ComponentStore>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the array for component type `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AlreadyRegistered`] if `C` already has an array.
    pub fn register<C: Component, const N: usize>(
        &mut self,
        array: ComponentArray<C, N>,
    ) -> EcsResult<()> {
        let name = ComponentArray::<C, N>::component_name();
        if self.stores.contains_key(&TypeId::of::<C>()) {
            return Err(EcsError::AlreadyRegistered(name));
        }

        debug!(component = name, slots = N, capacity = array.capacity(), "component array registered");
        self.stores.insert(TypeId::of::<C>(), Box::new(array));
        Ok(())
    }

    /// Returns the array for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::NotRegistered`] if no array with `N` slots is
    /// registered for `C`.
    pub fn get<C: Component, const N: usize>(&self) -> EcsResult<&ComponentArray<C, N>> {
        self.stores
            .get(&TypeId::of::<C>())
            .and_then(|store| store.as_any().downcast_ref())
            .ok_or(EcsError::NotRegistered(ComponentArray::<C, N>::component_name()))
    }

    /// Returns the array for `C` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`ComponentRegistry::get`].
    pub fn get_mut<C: Component, const N: usize>(
        &mut self,
    ) -> EcsResult<&mut ComponentArray<C, N>> {
        self.stores
            .get_mut(&TypeId::of::<C>())
            .and_then(|store| store.as_any_mut().downcast_mut())
            .ok_or(EcsError::NotRegistered(ComponentArray::<C, N>::component_name()))
    }

    /// Checks whether `entity` holds a `C` component.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.stores
            .get(&TypeId::of::<C>())
            .is_some_and(|store| store.has(entity))
    }

    /// Bitmask of the component IDs `entity` holds.
    #[must_use]
    pub fn signature(&self, entity: Entity) -> u64 {
        self.stores
            .values()
            .filter(|store| store.has(entity))
            .fold(0, |mask, store| mask | store.component_bit())
    }

    /// Removes `entity` from every registered array.
    pub fn entity_destroyed(&mut self, entity: Entity) {
        for store in self.stores.values_mut() {
            store.on_entity_destroyed(entity);
        }
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if no component type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stores.values().map(|s| (s.component_name(), s.len())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Position, Velocity};

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register(ComponentArray::<Position>::new()).unwrap();
        registry.register(ComponentArray::<Velocity>::new()).unwrap();
        registry
    }

    #[test]
    fn test_register_twice_rejected() {
        let mut registry = registry();
        let err = registry.register(ComponentArray::<Position>::new()).unwrap_err();
        assert!(matches!(err, EcsError::AlreadyRegistered(_)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_with_wrong_slot_count() {
        let registry = registry();
        assert!(registry.get::<Position, 2>().is_ok());
        assert!(matches!(
            registry.get::<Position, 3>(),
            Err(EcsError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_signature_and_destroy() {
        let mut registry = registry();
        let e = Entity::new(0, 0);
        registry
            .get_mut::<Position, 2>()
            .unwrap()
            .insert(e, Position::default())
            .unwrap();
        registry
            .get_mut::<Velocity, 2>()
            .unwrap()
            .insert(e, Velocity::default())
            .unwrap();

        assert_eq!(registry.signature(e), 0b11);

        registry.entity_destroyed(e);

        assert_eq!(registry.signature(e), 0);
        assert!(!registry.has::<Position>(e));
        assert!(registry.get::<Velocity, 2>().unwrap().is_empty());
    }

    #[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Flag {
        raised: u32,
    }

    impl Component for Flag {
        const ID: u8 = 63;
    }

    #[test]
    fn test_signature_uses_highest_bit() {
        let mut registry = registry();
        registry.register(ComponentArray::<Flag>::new()).unwrap();
        let e = Entity::new(3, 1);
        registry.get_mut::<Flag, 2>().unwrap().insert(e, Flag::default()).unwrap();
        registry
            .get_mut::<Position, 2>()
            .unwrap()
            .insert(e, Position::default())
            .unwrap();

        assert_eq!(registry.signature(e), (1 << 63) | 1);
    }
}
