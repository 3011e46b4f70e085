//! # Entity Management
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into the sparse arrays of every component store
//! - A generation counter for safe reuse

use std::fmt;

const INDEX_BITS: u32 = 22;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << (32 - INDEX_BITS)) - 1;

/// Unique identifier for an entity.
///
/// The id is split into two parts:
/// - Lower 22 bits: slot index
/// - Upper 10 bits: generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Highest usable slot index. The all-ones index is reserved for [`Entity::NULL`].
    pub const MAX_INDEX: u32 = INDEX_MASK - 1;

    /// Null/invalid entity id.
    pub const NULL: Self = Self(u32::MAX);

    /// Creates a new entity id from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - Slot index (masked to 22 bits)
    /// * `generation` - Generation counter (masked to 10 bits)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation & GENERATION_MASK) << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.0 >> INDEX_BITS
    }

    /// Returns the raw packed bits.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Checks if this entity id is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
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

/// Allocates entity ids and tracks which are alive.
///
/// Killing an entity bumps its slot generation immediately, so stale ids are
/// rejected at once, but the slot only returns to the free list when
/// [`EntityAllocator::recycle`] is called.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation of every slot ever handed out.
    generations: Vec<u32>,
    /// Liveness flag per slot.
    alive: Vec<bool>,
    /// Slots ready for reuse.
    free_indices: Vec<u32>,
    /// Number of live entities.
    alive_count: usize,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Allocates an entity id, reusing a recycled slot if one is available.
    ///
    /// # Returns
    ///
    /// The new id, or `Entity::NULL` once every index is in use.
    pub fn allocate(&mut self) -> Entity {
        let index = if let Some(index) = self.free_indices.pop() {
            index
        } else {
            let next = self.generations.len();
            let Ok(index) = u32::try_from(next) else {
                return Entity::NULL;
            };
            if index > Entity::MAX_INDEX {
                return Entity::NULL;
            }
            self.generations.push(0);
            self.alive.push(false);
            index
        };

        let slot = index as usize;
        self.alive[slot] = true;
        self.alive_count += 1;
        Entity::new(index, self.generations[slot])
    }

    /// Marks an entity dead and invalidates every copy of its id.
    ///
    /// # Returns
    ///
    /// `true` if the entity was alive.
    pub fn kill(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.index() as usize;
        self.alive[slot] = false;
        self.generations[slot] = (self.generations[slot] + 1) & GENERATION_MASK;
        self.alive_count -= 1;
        true
    }

    /// Returns a killed slot to the free list.
    pub fn recycle(&mut self, index: u32) {
        let slot = index as usize;
        if slot < self.alive.len() && !self.alive[slot] {
            self.free_indices.push(index);
        }
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let slot = entity.index() as usize;
        slot < self.alive.len()
            && self.alive[slot]
            && self.generations[slot] == entity.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = Entity::new(12345, 678);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 678);
        assert_eq!(id.to_string(), "12345v678");
    }

    #[test]
    fn test_generation_wraps_into_mask() {
        let id = Entity::new(1, GENERATION_MASK + 3);
        assert_eq!(id.generation(), 2);
        assert_eq!(id.index(), 1);
        assert!(!id.is_null());
    }

    #[test]
    fn test_killed_id_is_stale_before_recycle() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        assert!(alloc.kill(a));
        assert!(!alloc.is_alive(a));
        assert!(!alloc.kill(a));

        // Slot not recycled yet: a fresh index is handed out.
        let b = alloc.allocate();
        assert_ne!(a.index(), b.index());
    }

    #[test]
    fn test_recycled_slot_gets_new_generation() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        alloc.kill(a);
        alloc.recycle(a.index());

        let b = alloc.allocate();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(alloc.is_alive(b));
        assert!(!alloc.is_alive(a));
        assert_eq!(alloc.alive_count(), 1);
    }

    #[test]
    fn test_recycle_of_live_slot_is_ignored() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        alloc.recycle(a.index());
        let b = alloc.allocate();
        assert_ne!(a, b);
    }
}
