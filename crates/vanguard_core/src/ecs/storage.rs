//! # Component Storage
//!
//! Sparse-set storage for a single component type.
//!
//! ```text
//! sparse  [ -, 2, -, 0, 1 ]          entity index -> dense index
//!              │     │  │
//! dense   [ T(e3), T(e4), T(e1) ]    packed values
//! owners  [  e3,    e4,    e1   ]    dense index -> entity
//! dirty   [  0,     1,     0    ]    changed since last drain
//! ```
//!
//! Removal swaps the victim with the last dense slot and pops, carrying the
//! moved slot's dirty flag along. Invariant: `sparse[owners[i].index()] == i`.

use std::any::Any;

use super::component::{Component, ComponentTypeId};
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};
use crate::memory::AssetCatalog;
use crate::wire::{Replicated, WireWriter};

/// Sentinel for "no dense slot".
const ABSENT: u32 = u32::MAX;

/// Serializes one component value; attached to stores of replicated types.
type EncodeFn<C> = fn(&C, &mut WireWriter, &dyn AssetCatalog);

fn encode_replicated<C: Replicated>(value: &C, writer: &mut WireWriter, assets: &dyn AssetCatalog) {
    value.encode(writer, assets);
}

/// Dense storage for one component type with per-entity dirty flags.
///
/// # Type Parameters
///
/// * `C` - The component type to store
pub struct ComponentStore<C: Component> {
    /// Entity index -> dense index, or `ABSENT`.
    sparse: Vec<u32>,
    /// Packed component values.
    dense: Vec<C>,
    /// Dense index -> owning entity.
    owners: Vec<Entity>,
    /// Dense index -> changed since last drain.
    dirty: Vec<bool>,
    /// Present only for replicated types.
    encoder: Option<EncodeFn<C>>,
}

impl<C: Component> Default for ComponentStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> ComponentStore<C> {
    /// Creates an empty, local-only store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            owners: Vec::new(),
            dirty: Vec::new(),
            encoder: None,
        }
    }

    /// Creates an empty store whose values can be written to the wire.
    #[must_use]
    pub fn replicated() -> Self
    where
        C: Replicated,
    {
        Self {
            encoder: Some(encode_replicated::<C>),
            ..Self::new()
        }
    }

    /// Attaches the wire encoder to an existing store.
    pub fn enable_replication(&mut self)
    where
        C: Replicated,
    {
        self.encoder = Some(encode_replicated::<C>);
    }

    #[inline]
    fn slot_of(&self, entity: Entity) -> Option<usize> {
        let dense = *self.sparse.get(entity.index() as usize)?;
        if dense == ABSENT {
            return None;
        }
        let dense = dense as usize;
        (self.owners[dense] == entity).then_some(dense)
    }

    /// Number of stored components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns true if the store holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Checks whether `entity` carries this component.
    #[inline]
    #[must_use]
    pub fn has(&self, entity: Entity) -> bool {
        self.slot_of(entity).is_some()
    }

    /// Inserts or overwrites the component for `entity` and marks it dirty.
    ///
    /// O(1) amortized.
    pub fn add(&mut self, entity: Entity, value: C) {
        let index = entity.index() as usize;
        if let Some(&dense) = self.sparse.get(index) {
            if dense != ABSENT {
                let dense = dense as usize;
                // Same slot index always means same live entity: the registry
                // strips every component before a slot is reused.
                self.dense[dense] = value;
                self.owners[dense] = entity;
                self.dirty[dense] = true;
                return;
            }
        } else {
            self.sparse.resize(index + 1, ABSENT);
        }

        // Dense length is bounded by the 22-bit entity index space.
        #[allow(clippy::cast_possible_truncation)]
        let dense = self.dense.len() as u32;
        self.sparse[index] = dense;
        self.dense.push(value);
        self.owners.push(entity);
        self.dirty.push(true);
    }

    /// Removes the component for `entity`.
    ///
    /// O(1): the last dense slot is swapped into the hole. Removing a
    /// component the entity does not carry logs a warning and returns `None`.
    pub fn remove(&mut self, entity: Entity) -> Option<C> {
        let Some(dense) = self.slot_of(entity) else {
            tracing::warn!("remove of absent {} component on entity {}", C::NAME, entity);
            return None;
        };

        let last = self.dense.len() - 1;
        if dense != last {
            let moved = self.owners[last];
            // Within u32 range, see `add`.
            #[allow(clippy::cast_possible_truncation)]
            {
                self.sparse[moved.index() as usize] = dense as u32;
            }
        }
        self.sparse[entity.index() as usize] = ABSENT;
        self.owners.swap_remove(dense);
        self.dirty.swap_remove(dense);
        Some(self.dense.swap_remove(dense))
    }

    /// Returns the component for `entity`.
    ///
    /// # Errors
    ///
    /// `EcsError::MissingComponent` if `entity` does not carry it.
    #[inline]
    pub fn get(&self, entity: Entity) -> EcsResult<&C> {
        self.slot_of(entity)
            .map(|dense| &self.dense[dense])
            .ok_or(EcsError::MissingComponent {
                entity,
                component: C::NAME,
            })
    }

    /// Returns the component for `entity` mutably and marks it dirty.
    ///
    /// # Errors
    ///
    /// `EcsError::MissingComponent` if `entity` does not carry it.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        let Some(dense) = self.slot_of(entity) else {
            return Err(EcsError::MissingComponent {
                entity,
                component: C::NAME,
            });
        };
        self.dirty[dense] = true;
        Ok(&mut self.dense[dense])
    }

    /// Returns a copy of the component, or the type's default if absent.
    ///
    /// The miss is logged so gameplay code can keep running.
    #[must_use]
    pub fn get_or_default(&self, entity: Entity) -> C
    where
        C: Clone + Default,
    {
        match self.get(entity) {
            Ok(value) => value.clone(),
            Err(err) => {
                tracing::warn!("{err}, using default");
                C::default()
            }
        }
    }

    /// Returns true if `entity` changed since the last drain.
    #[must_use]
    pub fn is_dirty(&self, entity: Entity) -> bool {
        self.slot_of(entity).is_some_and(|dense| self.dirty[dense])
    }

    /// Returns every dirty entity and clears their flags.
    ///
    /// Draining twice with no writes in between yields an empty second set.
    pub fn drain_dirty(&mut self) -> Vec<Entity> {
        let mut drained = Vec::new();
        for (dense, flag) in self.dirty.iter_mut().enumerate() {
            if *flag {
                *flag = false;
                drained.push(self.owners[dense]);
            }
        }
        drained
    }

    /// Marks every stored component dirty, forcing a full resync.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Entities carrying this component, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.owners
    }

    /// Iterates over `(entity, component)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    /// Iterates mutably, marking every visited component dirty.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.dirty.fill(true);
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }
}

/// Type-erased view of a [`ComponentStore`].
///
/// This is the capability set the registry and the replication sweep need
/// without knowing the concrete component type.
pub trait ErasedStore: Any + Send + Sync {
    /// Registered component name.
    fn component_name(&self) -> &'static str;

    /// Wire id of the stored type.
    fn type_id_hash(&self) -> ComponentTypeId;

    /// Checks whether `entity` carries this component.
    fn has(&self, entity: Entity) -> bool;

    /// Removes the component if present. Returns true if something was removed.
    fn remove_untyped(&mut self, entity: Entity) -> bool;

    /// Returns every dirty entity and clears their flags.
    fn drain_dirty_untyped(&mut self) -> Vec<Entity>;

    /// Marks every stored component dirty.
    fn mark_all_dirty(&mut self);

    /// Returns true if values of this type can be encoded for the wire.
    fn is_replicated(&self) -> bool;

    /// Serializes the component of `entity`, or `None` if the type is not
    /// replicated or the entity does not carry it.
    fn encode_payload(&self, entity: Entity, assets: &dyn AssetCatalog) -> Option<Vec<u8>>;

    /// Entities carrying this component.
    fn entities(&self) -> &[Entity];

    /// Number of stored components.
    fn len(&self) -> usize;

    /// Returns true if the store holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upcast for downcasting to the concrete store.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete store.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedStore for ComponentStore<C> {
    fn component_name(&self) -> &'static str {
        C::NAME
    }

    fn type_id_hash(&self) -> ComponentTypeId {
        C::TYPE_ID
    }

    fn has(&self, entity: Entity) -> bool {
        ComponentStore::has(self, entity)
    }

    fn remove_untyped(&mut self, entity: Entity) -> bool {
        if !ComponentStore::has(self, entity) {
            return false;
        }
        self.remove(entity).is_some()
    }

    fn drain_dirty_untyped(&mut self) -> Vec<Entity> {
        self.drain_dirty()
    }

    fn mark_all_dirty(&mut self) {
        ComponentStore::mark_all_dirty(self);
    }

    fn is_replicated(&self) -> bool {
        self.encoder.is_some()
    }

    fn encode_payload(&self, entity: Entity, assets: &dyn AssetCatalog) -> Option<Vec<u8>> {
        let encode = self.encoder?;
        let dense = self.slot_of(entity)?;
        let mut writer = WireWriter::new();
        encode(&self.dense[dense], &mut writer, assets);
        Some(writer.into_bytes())
    }

    fn entities(&self) -> &[Entity] {
        &self.owners
    }

    fn len(&self) -> usize {
        self.dense.len()
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
    use crate::memory::NoAssets;
    use crate::wire::WireReader;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Hp(i32);

    impl Component for Hp {
        const NAME: &'static str = "Hp";
    }

    impl Replicated for Hp {
        fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
            writer.write_i32(self.0);
        }

        fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
            reader.read_i32().map(Hp)
        }
    }

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    #[test]
    fn test_add_get_has() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(e(3), Hp(10));
        assert!(store.has(e(3)));
        assert!(!store.has(e(2)));
        assert_eq!(store.get(e(3)), Ok(&Hp(10)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_overwrites_in_place_and_marks_dirty() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(e(1), Hp(10));
        store.drain_dirty();

        store.add(e(1), Hp(20));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(e(1)), Ok(&Hp(20)));
        assert_eq!(store.drain_dirty(), vec![e(1)]);
    }

    #[test]
    fn test_missing_component_error() {
        let store = ComponentStore::<Hp>::new();
        let err = store.get(e(9)).unwrap_err();
        assert_eq!(
            err,
            EcsError::MissingComponent {
                entity: e(9),
                component: "Hp"
            }
        );
        assert_eq!(store.get_or_default(e(9)), Hp(0));
    }

    #[test]
    fn test_remove_absent_is_silent() {
        let mut store = ComponentStore::<Hp>::new();
        assert_eq!(store.remove(e(4)), None);
        store.add(e(4), Hp(1));
        assert_eq!(store.remove(e(4)), Some(Hp(1)));
        assert_eq!(store.remove(e(4)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_stale_generation_is_not_present() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(Entity::new(5, 1), Hp(1));
        assert!(!store.has(Entity::new(5, 0)));
        assert!(store.get(Entity::new(5, 2)).is_err());
    }

    #[test]
    fn test_swap_remove_keeps_sparse_consistent() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(e(10), Hp(1));
        store.add(e(20), Hp(2));
        store.add(e(30), Hp(3));
        store.drain_dirty();
        store.get_mut(e(30)).unwrap().0 = 33;

        store.remove(e(10));
        assert_eq!(store.get(e(30)), Ok(&Hp(33)));
        assert_eq!(store.get(e(20)), Ok(&Hp(2)));
        // Dirty flag travelled with the moved slot.
        assert_eq!(store.drain_dirty(), vec![e(30)]);
    }

    #[test]
    fn test_drain_twice_yields_empty() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(e(1), Hp(1));
        store.add(e(2), Hp(2));
        assert_eq!(store.drain_dirty().len(), 2);
        assert!(store.drain_dirty().is_empty());
        assert!(!store.is_dirty(e(1)));
    }

    #[test]
    fn test_mark_all_dirty() {
        let mut store = ComponentStore::<Hp>::new();
        for i in 0..4 {
            store.add(e(i), Hp(0));
        }
        store.drain_dirty();
        store.mark_all_dirty();
        assert_eq!(store.drain_dirty().len(), 4);
    }

    #[test]
    fn test_get_mut_marks_dirty() {
        let mut store = ComponentStore::<Hp>::new();
        store.add(e(7), Hp(3));
        store.drain_dirty();
        store.get_mut(e(7)).unwrap().0 -= 1;
        assert!(store.is_dirty(e(7)));
    }

    #[test]
    fn test_encode_payload_only_when_replicated() {
        let mut local = ComponentStore::<Hp>::new();
        local.add(e(1), Hp(5));
        assert!(!ErasedStore::is_replicated(&local));
        assert!(local.encode_payload(e(1), &NoAssets).is_none());

        let mut wired = ComponentStore::<Hp>::replicated();
        wired.add(e(1), Hp(5));
        let bytes = wired.encode_payload(e(1), &NoAssets).unwrap();
        assert_eq!(bytes, 5i32.to_le_bytes());
        assert!(wired.encode_payload(e(2), &NoAssets).is_none());
    }

    #[test]
    fn test_random_operations_preserve_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
        let mut store = ComponentStore::<Hp>::new();
        let mut model: HashMap<u32, i32> = HashMap::new();

        for _ in 0..5_000 {
            let index = rng.gen_range(0..64);
            if rng.gen_bool(0.6) {
                let value = rng.gen_range(-100..100);
                store.add(e(index), Hp(value));
                model.insert(index, value);
            } else {
                let removed = store.remove(e(index)).map(|hp| hp.0);
                assert_eq!(removed, model.remove(&index));
            }

            assert_eq!(store.len(), model.len());
        }

        for (dense, owner) in store.entities().iter().enumerate() {
            assert_eq!(store.sparse[owner.index() as usize] as usize, dense);
        }
        for (index, value) in &model {
            assert_eq!(store.get(e(*index)), Ok(&Hp(*value)));
        }
        for index in 0..64 {
            assert_eq!(store.has(e(index)), model.contains_key(&index));
        }
    }
}
