//! # Slot Map
//!
//! Growable slot storage with generation-checked handles.
//!
//! Freeing a slot bumps its generation, so every handle issued before the
//! free fails lookup afterwards, even once the slot is reused.

/// Handle to a value in a [`SlotMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    /// Slot index.
    pub index: u32,
    /// Generation the slot had when the handle was issued.
    pub generation: u32,
}

impl ResourceHandle {
    /// Handle that never resolves.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
    };

    /// Returns true if this is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.index == u32::MAX
    }
}

impl Default for ResourceHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage for objects that are loaded and released at runtime.
///
/// # Example
///
/// ```rust,ignore
/// let mut slots: SlotMap<Texture> = SlotMap::new();
/// let handle = slots.insert(texture);
/// slots.remove(handle);
/// assert!(slots.get(handle).is_none()); // stale
/// ```
#[derive(Clone, Debug)]
pub struct SlotMap<T> {
    /// The storage array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotMap<T> {
    /// Creates an empty slot map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value, reusing a freed slot when possible.
    ///
    /// O(1) amortized.
    pub fn insert(&mut self, value: T) -> ResourceHandle {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ResourceHandle {
                index,
                generation: slot.generation,
            };
        }

        // Slot count never approaches u32::MAX for asset tables.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        ResourceHandle {
            index,
            generation: 1,
        }
    }

    /// Frees a slot. Stale or invalid handles return `None`.
    pub fn remove(&mut self, handle: ResourceHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free_list.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Checks whether a handle still resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a stored value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Gets a mutable reference to a stored value.
    #[inline]
    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Iterates over all stored values.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let handle = ResourceHandle {
                index: index as u32,
                generation: slot.generation,
            };
            slot.value.as_ref().map(|value| (handle, value))
        })
    }

    /// Frees every slot, invalidating all outstanding handles.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1).max(1);
            }
            #[allow(clippy::cast_possible_truncation)]
            self.free_list.push(index as u32);
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut slots: SlotMap<u32> = SlotMap::new();

        let h1 = slots.insert(42);
        assert_eq!(slots.get(h1), Some(&42));
        assert_eq!(slots.len(), 1);

        assert_eq!(slots.remove(h1), Some(42));
        assert!(slots.is_empty());
        assert_eq!(slots.remove(h1), None);
    }

    #[test]
    fn test_stale_handle_fails_after_reuse() {
        let mut slots: SlotMap<&str> = SlotMap::new();

        let old = slots.insert("ship.png");
        slots.remove(old);
        let new = slots.insert("enemy.png");

        assert_eq!(old.index, new.index); // Same slot reused
        assert_ne!(old.generation, new.generation);
        assert_eq!(slots.get(old), None);
        assert_eq!(slots.get(new), Some(&"enemy.png"));
    }

    #[test]
    fn test_invalid_handle() {
        let slots: SlotMap<u8> = SlotMap::new();
        assert!(ResourceHandle::default().is_invalid());
        assert!(!slots.contains(ResourceHandle::INVALID));
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut slots: SlotMap<u8> = SlotMap::new();
        let a = slots.insert(1);
        let b = slots.insert(2);
        slots.clear();
        assert!(slots.get(a).is_none());
        assert!(slots.get(b).is_none());

        let c = slots.insert(3);
        assert_eq!(c.index, 0);
        assert_eq!(slots.iter().count(), 1);
    }
}
