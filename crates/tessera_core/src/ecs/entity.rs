//! # Entity Handles
//!
//! Entities are lightweight identifiers consisting of:
//! - An index handed out by the allocator
//! - A generation counter for safe reuse

use std::fmt;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null/invalid entity.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates an entity from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this entity is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns the packed representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

/// Hands out entity handles and recycles freed indices.
///
/// # Capacity
///
/// The allocator has a fixed capacity set at creation; index storage is
/// reserved upfront.
///
/// # Example
///
/// ```rust
/// use tessera_core::EntityAllocator;
///
/// let mut entities = EntityAllocator::new(16);
/// let a = entities.allocate().unwrap();
/// assert!(entities.is_alive(a));
/// assert!(entities.free(a));
/// assert!(!entities.is_alive(a));
/// ```
#[derive(Debug)]
pub struct EntityAllocator {
    /// Current generation per index.
    generations: Box<[u32]>,
    /// Alive flag per index.
    alive: Box<[bool]>,
    /// Free indices, popped from the back.
    free_indices: Vec<u32>,
    alive_count: usize,
}

impl EntityAllocator {
    /// Creates an allocator for up to `capacity` simultaneously alive entities.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            u32::try_from(capacity).is_ok(),
            "Capacity cannot exceed u32::MAX"
        );

        Self {
            generations: vec![0; capacity].into_boxed_slice(),
            alive: vec![false; capacity].into_boxed_slice(),
            // Lowest index handed out first.
            free_indices: (0..capacity as u32).rev().collect(),
            alive_count: 0,
        }
    }

    /// Returns the maximum number of alive entities.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates a new entity, or `None` if capacity is reached.
    pub fn allocate(&mut self) -> Option<Entity> {
        let index = self.free_indices.pop()?;
        let idx = index as usize;

        self.alive[idx] = true;
        self.alive_count += 1;
        Some(Entity::new(index, self.generations[idx]))
    }

    /// Frees an entity so its index can be reused.
    ///
    /// Returns `false` if the entity was already dead or stale.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index() as usize;

        self.alive[idx] = false;
        // Invalidate outstanding handles to this index.
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.alive_count -= 1;
        self.free_indices.push(entity.index());
        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let idx = entity.index() as usize;
        idx < self.capacity() && self.alive[idx] && self.generations[idx] == entity.generation()
    }

    /// Iterates over all alive entities in index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .zip(self.generations.iter())
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, generation))| Entity::new(index as u32, *generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_roundtrip() {
        let entity = Entity::new(12345, 67890);
        assert_eq!(entity.index(), 12345);
        assert_eq!(entity.generation(), 67890);
        assert!(!entity.is_null());
        assert!(Entity::default().is_null());
    }

    #[test]
    fn test_entity_display() {
        assert_eq!(Entity::new(3, 1).to_string(), "3v1");
        assert_eq!(Entity::NULL.to_string(), "null");
    }

    #[test]
    fn test_allocator_reuse_bumps_generation() {
        let mut entities = EntityAllocator::new(1);

        let first = entities.allocate().unwrap();
        assert!(entities.allocate().is_none());
        assert!(entities.free(first));
        assert!(!entities.free(first));

        let second = entities.allocate().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(!entities.is_alive(first));
        assert!(entities.is_alive(second));
    }

    #[test]
    fn test_allocator_iter_alive() {
        let mut entities = EntityAllocator::new(8);
        let all: Vec<_> = (0..5).filter_map(|_| entities.allocate()).collect();
        entities.free(all[1]);
        entities.free(all[3]);

        let alive: Vec<_> = entities.iter_alive().collect();
        assert_eq!(alive, vec![all[0], all[2], all[4]]);
        assert_eq!(entities.alive_count(), 3);
    }
}
