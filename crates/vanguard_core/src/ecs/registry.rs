//! # Entity Registry
//!
//! The central container: owns entity allocation and one type-erased store
//! per component type.
//!
//! Destroying an entity strips it from every store. If it carried a
//! [`NetworkIdentity`] a destroy record is queued for the replication sweep;
//! the entity's slot is only reused after [`Registry::drain_destroyed`], so an
//! id never changes meaning while a destroy is still pending.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use super::component::{Component, ComponentTypeId};
use super::entity::{Entity, EntityAllocator};
use super::identity::NetworkIdentity;
use super::storage::{ComponentStore, ErasedStore};
use crate::error::{EcsError, EcsResult};
use crate::wire::Replicated;

/// Record of a destroyed entity awaiting the replication sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestroyedEntity {
    /// The local id that was destroyed.
    pub entity: Entity,
    /// Its network GUID, if it was replicated.
    pub global_id: Option<u64>,
    /// Its audience scope, if a scope component is tracked and was present.
    pub scope: Option<u32>,
}

/// Component that partitions entities into replication audiences.
///
/// The registry reads it at destroy time so the destroy notice can be
/// routed like the entity's updates were.
pub trait ScopeComponent: Component + Copy {
    /// Audience id.
    fn scope_id(&self) -> u32;
}

type ScopeReader = fn(&Registry, Entity) -> Option<u32>;

fn read_scope<S: ScopeComponent>(registry: &Registry, entity: Entity) -> Option<u32> {
    registry.get::<S>(entity).ok().map(S::scope_id)
}

/// The ECS registry - container for all entities and component stores.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = Registry::new();
/// let entity = registry.create();
/// registry.add(entity, Health::new(100))?;
/// registry.get_mut::<Health>(entity)?.current_hp -= 10;
/// ```
#[derive(Default)]
pub struct Registry {
    /// Entity id allocation.
    entities: EntityAllocator,
    /// Component stores in registration order.
    stores: Vec<Box<dyn ErasedStore>>,
    /// Rust type -> position in `stores`.
    index: HashMap<TypeId, usize>,
    /// Destroys not yet drained.
    destroyed: Vec<DestroyedEntity>,
    /// Reads the audience scope recorded with each destroy.
    scope_reader: Option<ScopeReader>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("alive", &self.alive_count())
            .field(
                "stores",
                &self.stores.iter().map(|store| store.component_name()).collect::<Vec<_>>(),
            )
            .field("pending_destroys", &self.destroyed.len())
            .finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Allocates a new entity with no components.
    ///
    /// # Returns
    ///
    /// A fresh or generation-bumped id, or `Entity::NULL` once the 22-bit
    /// slot space is exhausted.
    pub fn create(&mut self) -> Entity {
        let entity = self.entities.allocate();
        if entity.is_null() {
            tracing::error!("entity slot space exhausted");
        }
        entity
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Destroys an entity, removing it from every store.
    ///
    /// Destroying an already-dead entity logs a warning and does nothing.
    ///
    /// # Returns
    ///
    /// `true` if the entity was alive.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            tracing::warn!("destroy of dead entity {}", entity);
            return false;
        }

        let global_id = self
            .store::<NetworkIdentity>()
            .and_then(|store| store.get(entity).ok())
            .map(|identity| identity.global_id);
        let scope = self.scope_reader.and_then(|read| read(self, entity));

        for store in &mut self.stores {
            store.remove_untyped(entity);
        }
        self.entities.kill(entity);
        self.destroyed.push(DestroyedEntity {
            entity,
            global_id,
            scope,
        });
        true
    }

    /// Records `S` with every later destroy record.
    pub fn track_scope<S: ScopeComponent>(&mut self) {
        self.scope_reader = Some(read_scope::<S>);
    }

    /// Returns queued destroy records and frees their slots for reuse.
    pub fn drain_destroyed(&mut self) -> Vec<DestroyedEntity> {
        let drained = std::mem::take(&mut self.destroyed);
        for record in &drained {
            self.entities.recycle(record.entity.index());
        }
        drained
    }

    /// Registers a replicated component type, attaching its wire encoder.
    ///
    /// Safe to call more than once.
    pub fn register_replicated<C: Replicated>(&mut self) {
        self.store_mut::<C>().enable_replication();
    }

    /// Returns the store for `C`, if one was ever created.
    #[must_use]
    pub fn store<C: Component>(&self) -> Option<&ComponentStore<C>> {
        let slot = *self.index.get(&TypeId::of::<C>())?;
        self.stores[slot].as_any().downcast_ref()
    }

    /// Returns the store for `C`, creating it on first use.
    pub fn store_mut<C: Component>(&mut self) -> &mut ComponentStore<C> {
        let slot = match self.index.get(&TypeId::of::<C>()) {
            Some(&slot) => slot,
            None => self.insert_store::<C>(),
        };
        self.stores[slot]
            .as_any_mut()
            .downcast_mut()
            .unwrap_or_else(|| unreachable!("store slot holds a different component type"))
    }

    fn insert_store<C: Component>(&mut self) -> usize {
        if let Some(clash) = self
            .stores
            .iter()
            .find(|store| store.type_id_hash() == C::TYPE_ID)
        {
            tracing::error!(
                "component {} hashes to {} like {}; wire ids will collide",
                C::NAME,
                C::TYPE_ID,
                clash.component_name()
            );
        }
        let slot = self.stores.len();
        self.stores.push(Box::new(ComponentStore::<C>::new()));
        self.index.insert(TypeId::of::<C>(), slot);
        slot
    }

    /// Type-erased stores in registration order.
    pub fn stores(&self) -> impl Iterator<Item = &(dyn ErasedStore + 'static)> {
        self.stores.iter().map(AsRef::as_ref)
    }

    /// Mutable type-erased stores in registration order.
    pub fn stores_mut(&mut self) -> impl Iterator<Item = &mut (dyn ErasedStore + 'static)> {
        self.stores.iter_mut().map(AsMut::as_mut)
    }

    /// Looks up a store by wire id.
    #[must_use]
    pub fn store_by_type_id(
        &self,
        type_id: ComponentTypeId,
    ) -> Option<&(dyn ErasedStore + 'static)> {
        self.stores().find(|store| store.type_id_hash() == type_id)
    }

    /// Attaches (or overwrites) a component and marks it dirty.
    ///
    /// # Errors
    ///
    /// `EcsError::DeadEntity` if `entity` is not alive.
    pub fn add<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::DeadEntity(entity));
        }
        self.store_mut::<C>().add(entity, value);
        Ok(())
    }

    /// Detaches a component. Absent components log a warning and yield `None`.
    pub fn remove<C: Component>(&mut self, entity: Entity) -> Option<C> {
        self.store_mut::<C>().remove(entity)
    }

    /// Checks whether `entity` carries `C`.
    #[must_use]
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.store::<C>().is_some_and(|store| store.has(entity))
    }

    /// Returns the `C` component of `entity`.
    ///
    /// # Errors
    ///
    /// `EcsError::MissingComponent` if absent.
    pub fn get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        match self.store::<C>() {
            Some(store) => store.get(entity),
            None => Err(EcsError::MissingComponent {
                entity,
                component: C::NAME,
            }),
        }
    }

    /// Returns the `C` component of `entity` mutably and marks it dirty.
    ///
    /// # Errors
    ///
    /// `EcsError::MissingComponent` if absent.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.store_mut::<C>().get_mut(entity)
    }

    /// Returns a copy of the component, or its default (logged) if absent.
    #[must_use]
    pub fn get_or_default<C: Component + Clone + Default>(&self, entity: Entity) -> C {
        match self.get::<C>(entity) {
            Ok(value) => value.clone(),
            Err(err) => {
                tracing::warn!("{err}, using default");
                C::default()
            }
        }
    }

    /// Finds the local entity carrying a given network GUID.
    #[must_use]
    pub fn find_by_global_id(&self, global_id: u64) -> Option<Entity> {
        self.store::<NetworkIdentity>()?
            .iter()
            .find(|(_, identity)| identity.global_id == global_id)
            .map(|(entity, _)| entity)
    }

    /// Marks every component of every store dirty.
    pub fn mark_all_dirty(&mut self) {
        for store in &mut self.stores {
            store.mark_all_dirty();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AssetCatalog, NoAssets};
    use crate::wire::{WireReader, WireWriter};

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Health {
        max_hp: i32,
        current_hp: i32,
    }

    impl Component for Health {
        const NAME: &'static str = "Health";
    }

    impl Replicated for Health {
        fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
            writer.write_i32(self.max_hp);
            writer.write_i32(self.current_hp);
        }

        fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
            Some(Self {
                max_hp: reader.read_i32()?,
                current_hp: reader.read_i32()?,
            })
        }
    }

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Marker;

    impl Component for Marker {
        const NAME: &'static str = "Marker";
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Room(u32);

    impl Component for Room {
        const NAME: &'static str = "Room";
    }

    impl ScopeComponent for Room {
        fn scope_id(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_health_write_is_dirty_once() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry
            .add(
                entity,
                Health {
                    max_hp: 100,
                    current_hp: 100,
                },
            )
            .unwrap();
        registry.store_mut::<Health>().drain_dirty();

        registry.get_mut::<Health>(entity).unwrap().current_hp = 90;
        assert_eq!(registry.store_mut::<Health>().drain_dirty(), vec![entity]);
        assert!(registry.store_mut::<Health>().drain_dirty().is_empty());
    }

    #[test]
    fn test_removed_health_is_missing() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry
            .add(
                entity,
                Health {
                    max_hp: 100,
                    current_hp: 100,
                },
            )
            .unwrap();

        assert_eq!(
            registry.remove::<Health>(entity),
            Some(Health {
                max_hp: 100,
                current_hp: 100,
            })
        );
        assert!(!registry.has::<Health>(entity));
        assert_eq!(
            registry.get::<Health>(entity),
            Err(EcsError::MissingComponent {
                entity,
                component: "Health",
            })
        );
        assert!(registry.is_alive(entity));
    }

    #[test]
    fn test_destroy_records_tracked_scope() {
        let mut registry = Registry::new();
        registry.track_scope::<Room>();
        let scoped = registry.create();
        registry.add(scoped, NetworkIdentity::new(9, 0)).unwrap();
        registry.add(scoped, Room(4)).unwrap();
        let unscoped = registry.create();

        registry.destroy(scoped);
        registry.destroy(unscoped);

        let scopes: Vec<Option<u32>> = registry
            .drain_destroyed()
            .iter()
            .map(|record| record.scope)
            .collect();
        assert_eq!(scopes, vec![Some(4), None]);
    }

    #[test]
    fn test_destroy_removes_from_every_store() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Health::default()).unwrap();
        registry.add(entity, Marker).unwrap();

        assert!(registry.destroy(entity));
        assert!(!registry.has::<Health>(entity));
        assert!(!registry.has::<Marker>(entity));
        assert!(!registry.is_alive(entity));
        assert_eq!(registry.alive_count(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut registry = Registry::new();
        let entity = registry.create();
        assert!(registry.destroy(entity));
        assert!(!registry.destroy(entity));
        assert_eq!(registry.drain_destroyed().len(), 1);
    }

    #[test]
    fn test_destroy_records_global_id() {
        let mut registry = Registry::new();
        let networked = registry.create();
        let local = registry.create();
        registry
            .add(networked, NetworkIdentity::new(0xABCD, 3))
            .unwrap();

        registry.destroy(networked);
        registry.destroy(local);

        let drained = registry.drain_destroyed();
        assert_eq!(
            drained,
            vec![
                DestroyedEntity {
                    entity: networked,
                    global_id: Some(0xABCD),
                    scope: None,
                },
                DestroyedEntity {
                    entity: local,
                    global_id: None,
                    scope: None,
                },
            ]
        );
    }

    #[test]
    fn test_slot_reused_only_after_drain() {
        let mut registry = Registry::new();
        let first = registry.create();
        registry.destroy(first);

        let second = registry.create();
        assert_ne!(first.index(), second.index());

        registry.drain_destroyed();
        let third = registry.create();
        assert_eq!(third.index(), first.index());
        assert_ne!(third, first);
    }

    #[test]
    fn test_add_to_dead_entity_fails() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.destroy(entity);
        assert_eq!(
            registry.add(entity, Marker),
            Err(EcsError::DeadEntity(entity))
        );
    }

    #[test]
    fn test_get_missing_store() {
        let mut registry = Registry::new();
        let entity = registry.create();
        assert!(registry.get::<Health>(entity).is_err());
        assert_eq!(registry.get_or_default::<Health>(entity), Health::default());
    }

    #[test]
    fn test_register_replicated_and_lookup_by_type_id() {
        let mut registry = Registry::new();
        registry.register_replicated::<Health>();
        registry.store_mut::<Marker>();

        let health = registry.store_by_type_id(Health::TYPE_ID).unwrap();
        assert!(health.is_replicated());
        assert_eq!(health.component_name(), "Health");

        let marker = registry.store_by_type_id(Marker::TYPE_ID).unwrap();
        assert!(!marker.is_replicated());

        let entity = registry.create();
        registry
            .add(
                entity,
                Health {
                    max_hp: 1,
                    current_hp: 1,
                },
            )
            .unwrap();
        let payload = registry
            .store_by_type_id(Health::TYPE_ID)
            .and_then(|store| store.encode_payload(entity, &NoAssets));
        assert_eq!(payload.map(|bytes| bytes.len()), Some(8));
    }

    #[test]
    fn test_find_by_global_id_and_mark_all_dirty() {
        let mut registry = Registry::new();
        let a = registry.create();
        let b = registry.create();
        registry.add(a, NetworkIdentity::new(1, 0)).unwrap();
        registry.add(b, NetworkIdentity::new(2, 0)).unwrap();
        assert_eq!(registry.find_by_global_id(2), Some(b));
        assert_eq!(registry.find_by_global_id(3), None);

        registry.store_mut::<NetworkIdentity>().drain_dirty();
        registry.mark_all_dirty();
        assert_eq!(registry.store_mut::<NetworkIdentity>().drain_dirty().len(), 2);
    }
}
