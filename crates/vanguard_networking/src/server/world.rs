//! Authoritative world state.

use vanguard_core::{Component, Entity, NetworkIdentity, Registry, ResourceManager};
use vanguard_shared::{register_replicated_components, LobbyScope};

use crate::replication::GuidSource;
use crate::session::ConnectionId;

/// Mixed into the server seed so GUIDs and session tokens use different streams.
const GUID_STREAM: u64 = 0x6775_6964_7321;

/// Registry, asset names and GUID allocation of the server.
///
/// Assets are never loaded server-side; the manager only maps texture names
/// to handles so components can refer to them and the wire can carry names.
#[derive(Debug)]
pub struct ServerWorld {
    /// Entities and components.
    pub registry: Registry,
    /// Asset names referenced by components.
    pub assets: ResourceManager<String>,
    guids: GuidSource,
}

impl ServerWorld {
    /// Creates an empty world with every shared component registered.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut registry = Registry::new();
        register_replicated_components(&mut registry);
        registry.track_scope::<LobbyScope>();
        Self {
            registry,
            assets: ResourceManager::new(|path| Some(path.to_owned())),
            guids: GuidSource::new(seed ^ GUID_STREAM),
        }
    }

    /// Creates an entity with a fresh GUID owned by `owner`.
    ///
    /// # Returns
    ///
    /// The local entity and its GUID.
    pub fn spawn_networked(
        &mut self,
        owner: ConnectionId,
        scope: Option<LobbyScope>,
    ) -> (Entity, u64) {
        let entity = self.registry.create();
        let guid = self.guids.next_guid();
        self.attach(entity, NetworkIdentity::new(guid, owner.0));
        if let Some(scope) = scope {
            self.attach(entity, scope);
        }
        (entity, guid)
    }

    /// Adds or overwrites a component, logging instead of failing.
    ///
    /// # Returns
    ///
    /// `false` if `entity` was no longer alive.
    pub fn attach<C: Component>(&mut self, entity: Entity, value: C) -> bool {
        match self.registry.add(entity, value) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{} not attached to {}: {}", C::NAME, entity, err);
                false
            }
        }
    }

    /// Local entity carrying `guid`.
    #[must_use]
    pub fn entity_of(&self, guid: u64) -> Option<Entity> {
        self.registry.find_by_global_id(guid)
    }

    /// Destroys every entity scoped to `scope`.
    ///
    /// # Returns
    ///
    /// Number of entities destroyed.
    pub fn despawn_scope(&mut self, scope: LobbyScope) -> usize {
        let doomed: Vec<Entity> = match self.registry.store::<LobbyScope>() {
            Some(store) => store
                .iter()
                .filter(|(_, lobby)| **lobby == scope)
                .map(|(entity, _)| entity)
                .collect(),
            None => return 0,
        };
        for &entity in &doomed {
            self.registry.destroy(entity);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_shared::Transform;

    #[test]
    fn test_attach_to_dead_entity_is_refused() {
        let mut world = ServerWorld::new(1);
        let (entity, _) = world.spawn_networked(ConnectionId(4), None);
        assert!(world.attach(entity, Transform::at(1.0, 1.0)));
        world.registry.destroy(entity);
        assert!(!world.attach(entity, Transform::at(2.0, 2.0)));
        assert!(world.registry.store::<Transform>().unwrap().is_empty());
    }

    #[test]
    fn test_spawn_networked_is_findable() {
        let mut world = ServerWorld::new(1);
        let (entity, guid) = world.spawn_networked(ConnectionId(4), Some(LobbyScope(2)));
        assert_ne!(guid, 0);
        assert_eq!(world.entity_of(guid), Some(entity));
        let identity = world.registry.get::<NetworkIdentity>(entity).unwrap();
        assert_eq!(identity.owner, 4);
        assert_eq!(world.registry.get::<LobbyScope>(entity), Ok(&LobbyScope(2)));
    }

    #[test]
    fn test_despawn_scope_only_touches_that_lobby() {
        let mut world = ServerWorld::new(1);
        let (a, _) = world.spawn_networked(ConnectionId::SERVER, Some(LobbyScope(1)));
        let (b, _) = world.spawn_networked(ConnectionId::SERVER, Some(LobbyScope(2)));
        world.registry.add(a, Transform::default()).unwrap();

        assert_eq!(world.despawn_scope(LobbyScope(1)), 1);
        assert!(!world.registry.is_alive(a));
        assert!(world.registry.is_alive(b));
        assert_eq!(world.registry.drain_destroyed().len(), 1);
    }
}
