//! Client side of replication: GUID-keyed components in.

use std::collections::{HashMap, HashSet};

use vanguard_core::{
    AssetCatalog, Component, ComponentTypeId, Entity, NetworkIdentity, Registry, Replicated,
    WireReader,
};
use vanguard_shared::{
    Health, Pattern, ResourcePool, Score, ScoreValue, Sprite, Tags, Team, Transform, Velocity,
};

use crate::error::{ReplicationError, ReplicationResult};
use crate::protocol::ComponentPacket;

type Deserializer = fn(&mut Registry, Entity, &[u8], &mut dyn AssetCatalog) -> bool;

fn decode_into<C: Replicated>(
    registry: &mut Registry,
    entity: Entity,
    bytes: &[u8],
    assets: &mut dyn AssetCatalog,
) -> bool {
    let mut reader = WireReader::new(bytes);
    match C::decode(&mut reader, assets) {
        Some(value) if reader.is_exhausted() => registry.add(entity, value).is_ok(),
        _ => false,
    }
}

/// What applying a packet did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A local entity was created for a new GUID.
    Created(Entity),
    /// An existing local entity was updated.
    Updated(Entity),
    /// A newer tick was already applied for this GUID and type.
    Stale,
}

impl Applied {
    /// Local entity touched, unless the packet was stale.
    #[must_use]
    pub const fn entity(self) -> Option<Entity> {
        match self {
            Self::Created(entity) | Self::Updated(entity) => Some(entity),
            Self::Stale => None,
        }
    }
}

/// Rebuilds remote entities from component packets.
///
/// Checks run in a fixed order: destroyed GUID, unknown type, stale tick,
/// then decode. Nothing is created for a packet that fails one of the first
/// three.
#[derive(Default)]
pub struct ReplicationReceiver {
    deserializers: HashMap<ComponentTypeId, (&'static str, Deserializer)>,
    entities: HashMap<u64, Entity>,
    last_applied: HashMap<(u64, ComponentTypeId), u32>,
    destroyed: HashSet<u64>,
}

impl ReplicationReceiver {
    /// Creates a receiver with no deserializers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a receiver that understands every shared gameplay component.
    #[must_use]
    pub fn with_shared_components() -> Self {
        let mut receiver = Self::new();
        receiver.register::<NetworkIdentity>();
        receiver.register::<Transform>();
        receiver.register::<Velocity>();
        receiver.register::<Health>();
        receiver.register::<Score>();
        receiver.register::<ScoreValue>();
        receiver.register::<Team>();
        receiver.register::<Tags>();
        receiver.register::<Pattern>();
        receiver.register::<ResourcePool>();
        receiver.register::<Sprite>();
        receiver
    }

    /// Adds the deserializer for `C`.
    pub fn register<C: Replicated>(&mut self) {
        if let Some((existing, _)) = self
            .deserializers
            .insert(C::TYPE_ID, (C::NAME, decode_into::<C>))
        {
            if existing != C::NAME {
                tracing::error!("{} replaces {} at type id {}", C::NAME, existing, C::TYPE_ID);
            }
        }
    }

    /// Local entity for a GUID.
    #[must_use]
    pub fn local_entity(&self, guid: u64) -> Option<Entity> {
        self.entities.get(&guid).copied()
    }

    /// Number of mapped GUIDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Applies one component packet produced at `tick`.
    ///
    /// # Errors
    ///
    /// `StaleGuid` for destroyed entities, `UnknownWireType` for
    /// unregistered types, `Malformed` if the payload does not decode.
    pub fn apply(
        &mut self,
        registry: &mut Registry,
        packet: &ComponentPacket,
        tick: u32,
        assets: &mut dyn AssetCatalog,
    ) -> ReplicationResult<Applied> {
        if self.destroyed.contains(&packet.guid) {
            return Err(ReplicationError::StaleGuid(packet.guid));
        }
        let Some(&(name, deserialize)) = self.deserializers.get(&packet.component_type) else {
            tracing::warn!("dropping unknown component type {}", packet.component_type);
            return Err(ReplicationError::UnknownWireType(packet.component_type));
        };
        let key = (packet.guid, packet.component_type);
        if self.last_applied.get(&key).is_some_and(|&last| tick <= last) {
            return Ok(Applied::Stale);
        }

        let (entity, created) = match self.local_entity(packet.guid) {
            Some(entity) if registry.is_alive(entity) => (entity, false),
            _ => {
                let entity = registry.create();
                if let Err(err) = registry.add(entity, NetworkIdentity::new(packet.guid, 0)) {
                    tracing::error!("cannot map {:#018x}: {}", packet.guid, err);
                }
                self.entities.insert(packet.guid, entity);
                tracing::debug!("guid {:#018x} is now {}", packet.guid, entity);
                (entity, true)
            }
        };

        if !deserialize(registry, entity, &packet.payload, assets) {
            tracing::warn!("malformed {} for {:#018x}", name, packet.guid);
            return Err(ReplicationError::Malformed {
                guid: packet.guid,
                component: name,
            });
        }
        self.last_applied.insert(key, tick);
        Ok(if created {
            Applied::Created(entity)
        } else {
            Applied::Updated(entity)
        })
    }

    /// Destroys the local copy of `guid` and refuses later packets for it.
    ///
    /// # Returns
    ///
    /// The destroyed local entity, if the GUID was mapped.
    pub fn apply_destroy(&mut self, registry: &mut Registry, guid: u64) -> Option<Entity> {
        self.destroyed.insert(guid);
        self.last_applied.retain(|&(owner, _), _| owner != guid);
        let entity = self.entities.remove(&guid)?;
        registry.destroy(entity);
        // The client never replicates, so its destroy queue is released here.
        registry.drain_destroyed();
        Some(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_core::{NoAssets, WireWriter};

    fn packet<C: Replicated>(guid: u64, value: &C) -> ComponentPacket {
        let mut writer = WireWriter::new();
        value.encode(&mut writer, &NoAssets);
        ComponentPacket {
            guid,
            component_type: C::TYPE_ID,
            payload: writer.into_bytes(),
        }
    }

    #[test]
    fn test_first_packet_creates_entity() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::with_shared_components();
        let applied = receiver
            .apply(&mut registry, &packet(7, &Transform::at(3.0, 4.0)), 1, &mut NoAssets)
            .unwrap();
        let Applied::Created(entity) = applied else {
            panic!("expected a new entity, got {applied:?}");
        };
        assert_eq!(registry.get::<NetworkIdentity>(entity).unwrap().global_id, 7);
        assert_eq!(*registry.get::<Transform>(entity).unwrap(), Transform::at(3.0, 4.0));
        assert_eq!(receiver.local_entity(7), Some(entity));
    }

    #[test]
    fn test_older_tick_never_overwrites() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::with_shared_components();
        receiver
            .apply(&mut registry, &packet(1, &Transform::at(5.0, 0.0)), 5, &mut NoAssets)
            .unwrap();
        let stale = receiver
            .apply(&mut registry, &packet(1, &Transform::at(3.0, 0.0)), 3, &mut NoAssets)
            .unwrap();
        assert_eq!(stale, Applied::Stale);
        let entity = receiver.local_entity(1).unwrap();
        assert!((registry.get::<Transform>(entity).unwrap().x - 5.0).abs() < f32::EPSILON);

        // Another type of the same entity tracks its own tick.
        let health = receiver
            .apply(&mut registry, &packet(1, &Health::new(10)), 2, &mut NoAssets)
            .unwrap();
        assert_eq!(health, Applied::Updated(entity));
    }

    #[test]
    fn test_unknown_type_creates_nothing() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::new();
        let unknown = ComponentPacket {
            guid: 3,
            component_type: ComponentTypeId::from_name("FutureComponent"),
            payload: vec![1, 2, 3],
        };
        assert_eq!(
            receiver.apply(&mut registry, &unknown, 1, &mut NoAssets),
            Err(ReplicationError::UnknownWireType(unknown.component_type))
        );
        assert_eq!(registry.alive_count(), 0);
        assert!(receiver.is_empty());
    }

    #[test]
    fn test_destroyed_guid_is_stale() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::with_shared_components();
        receiver
            .apply(&mut registry, &packet(9, &Health::new(3)), 1, &mut NoAssets)
            .unwrap();
        let entity = receiver.apply_destroy(&mut registry, 9).unwrap();
        assert!(!registry.is_alive(entity));
        assert_eq!(
            receiver.apply(&mut registry, &packet(9, &Health::new(3)), 2, &mut NoAssets),
            Err(ReplicationError::StaleGuid(9))
        );
        assert_eq!(registry.alive_count(), 0);
    }

    #[test]
    fn test_malformed_payload_reported() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::with_shared_components();
        let mut bad = packet(4, &Transform::at(1.0, 1.0));
        bad.payload.truncate(7);
        assert_eq!(
            receiver.apply(&mut registry, &bad, 1, &mut NoAssets),
            Err(ReplicationError::Malformed {
                guid: 4,
                component: "Transform"
            })
        );

        // A correct packet at the same tick still applies.
        let good = receiver
            .apply(&mut registry, &packet(4, &Transform::at(1.0, 1.0)), 1, &mut NoAssets)
            .unwrap();
        assert!(matches!(good, Applied::Updated(_)));
    }

    #[test]
    fn test_identity_packet_overwrites_owner() {
        let mut registry = Registry::new();
        let mut receiver = ReplicationReceiver::with_shared_components();
        let applied = receiver
            .apply(&mut registry, &packet(6, &NetworkIdentity::new(6, 2)), 1, &mut NoAssets)
            .unwrap();
        let entity = applied.entity().unwrap();
        assert_eq!(registry.get::<NetworkIdentity>(entity).unwrap().owner, 2);
    }
}
