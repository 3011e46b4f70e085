//! Server side of replication: dirty components out.

use vanguard_core::{AssetCatalog, ComponentTypeId, Entity, NetworkIdentity, Registry};
use vanguard_shared::LobbyScope;

use crate::protocol::{ComponentPacket, GameEvent, Message};

/// A replication message and who may see it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedMessage {
    /// Lobby the entity lives in; `None` goes to every in-game connection.
    pub scope: Option<LobbyScope>,
    /// `S_SNAPSHOT` or `S_ENTITY_DESTROY`.
    pub message: Message,
}

/// Drains destroy records and dirty replicated components into messages.
///
/// Destroys come first so a reused local slot can never be confused with
/// the entity it replaced.
#[derive(Debug, Default)]
pub struct ReplicationSender {
    packets_sent: u64,
    skipped_unidentified: u64,
}

impl ReplicationSender {
    /// Creates a sender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Component packets produced so far.
    #[must_use]
    pub const fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Dirty components dropped because their entity had no GUID.
    #[must_use]
    pub const fn skipped_unidentified(&self) -> u64 {
        self.skipped_unidentified
    }

    /// Collects everything that changed since the last call, tagged `tick`.
    pub fn collect(
        &mut self,
        registry: &mut Registry,
        assets: &dyn AssetCatalog,
        tick: u32,
    ) -> Vec<ScopedMessage> {
        let mut out = Vec::new();

        for record in registry.drain_destroyed() {
            if let Some(guid) = record.global_id {
                out.push(ScopedMessage {
                    scope: record.scope.map(LobbyScope),
                    message: Message::with_payload(GameEvent::SEntityDestroy, &guid).at_tick(tick),
                });
            }
        }

        let dirty: Vec<(ComponentTypeId, Vec<Entity>)> = registry
            .stores_mut()
            .filter(|store| store.is_replicated())
            .map(|store| (store.type_id_hash(), store.drain_dirty_untyped()))
            .filter(|(_, entities)| !entities.is_empty())
            .collect();

        for (component_type, entities) in dirty {
            let Some(store) = registry.store_by_type_id(component_type) else {
                continue;
            };
            for entity in entities {
                let Ok(identity) = registry.get::<NetworkIdentity>(entity) else {
                    self.skipped_unidentified += 1;
                    continue;
                };
                let Some(payload) = store.encode_payload(entity, assets) else {
                    continue;
                };
                let packet = ComponentPacket {
                    guid: identity.global_id,
                    component_type,
                    payload,
                };
                out.push(ScopedMessage {
                    scope: registry.get::<LobbyScope>(entity).ok().copied(),
                    message: Message::with_payload(GameEvent::SSnapshot, &packet).at_tick(tick),
                });
                self.packets_sent += 1;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_core::{Component, NoAssets};
    use vanguard_shared::{register_replicated_components, Health, HitFlash, Transform};

    fn world() -> Registry {
        let mut registry = Registry::new();
        register_replicated_components(&mut registry);
        registry
    }

    fn packets(messages: &[ScopedMessage]) -> Vec<ComponentPacket> {
        messages
            .iter()
            .filter(|scoped| scoped.message.event == GameEvent::SSnapshot)
            .map(|scoped| scoped.message.read().unwrap())
            .collect()
    }

    #[test]
    fn test_only_identified_entities_are_sent() {
        let mut registry = world();
        let networked = registry.create();
        registry.add(networked, NetworkIdentity::new(5, 0)).unwrap();
        registry.add(networked, Transform::at(1.0, 2.0)).unwrap();
        let local = registry.create();
        registry.add(local, Transform::at(3.0, 4.0)).unwrap();

        let mut sender = ReplicationSender::new();
        let sent = packets(&sender.collect(&mut registry, &NoAssets, 1));
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|packet| packet.guid == 5));
        assert_eq!(sender.skipped_unidentified(), 1);

        // Flags were cleared for both.
        assert!(sender.collect(&mut registry, &NoAssets, 2).is_empty());
    }

    #[test]
    fn test_local_components_never_sent() {
        let mut registry = world();
        let entity = registry.create();
        registry.add(entity, NetworkIdentity::new(5, 0)).unwrap();
        registry.add(entity, HitFlash::default()).unwrap();
        let sent = packets(&ReplicationSender::new().collect(&mut registry, &NoAssets, 1));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].component_type, NetworkIdentity::TYPE_ID);
    }

    #[test]
    fn test_only_mutated_component_resent() {
        let mut registry = world();
        let entity = registry.create();
        registry.add(entity, NetworkIdentity::new(8, 0)).unwrap();
        registry.add(entity, Transform::at(0.0, 0.0)).unwrap();
        registry.add(entity, Health::new(10)).unwrap();
        let mut sender = ReplicationSender::new();
        sender.collect(&mut registry, &NoAssets, 1);

        registry.get_mut::<Health>(entity).unwrap().current_hp = 4;
        let sent = packets(&sender.collect(&mut registry, &NoAssets, 2));
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].component_type, Health::TYPE_ID);
    }

    #[test]
    fn test_destroy_precedes_updates_and_carries_tick() {
        let mut registry = world();
        let doomed = registry.create();
        registry.add(doomed, NetworkIdentity::new(99, 0)).unwrap();
        let survivor = registry.create();
        registry.add(survivor, NetworkIdentity::new(100, 0)).unwrap();
        registry.destroy(doomed);

        let messages = ReplicationSender::new().collect(&mut registry, &NoAssets, 12);
        assert_eq!(messages[0].message.event, GameEvent::SEntityDestroy);
        assert_eq!(messages[0].message.read::<u64>(), Ok(99));
        assert!(messages.iter().all(|scoped| scoped.message.tick == 12));
    }

    #[test]
    fn test_scope_follows_lobby_component() {
        let mut registry = world();
        let entity = registry.create();
        registry.add(entity, NetworkIdentity::new(1, 0)).unwrap();
        registry.add(entity, LobbyScope(3)).unwrap();
        let messages = ReplicationSender::new().collect(&mut registry, &NoAssets, 0);
        assert_eq!(messages[0].scope, Some(LobbyScope(3)));
    }

    #[test]
    fn test_destroy_keeps_lobby_scope() {
        let mut registry = world();
        registry.track_scope::<LobbyScope>();
        let scoped = registry.create();
        registry.add(scoped, NetworkIdentity::new(40, 0)).unwrap();
        registry.add(scoped, LobbyScope(6)).unwrap();
        let global = registry.create();
        registry.add(global, NetworkIdentity::new(41, 0)).unwrap();
        registry.destroy(scoped);
        registry.destroy(global);

        let messages = ReplicationSender::new().collect(&mut registry, &NoAssets, 3);
        let destroys: Vec<_> = messages
            .iter()
            .filter(|scoped| scoped.message.event == GameEvent::SEntityDestroy)
            .map(|scoped| (scoped.message.read::<u64>().unwrap(), scoped.scope))
            .collect();
        assert_eq!(destroys, vec![(40, Some(LobbyScope(6))), (41, None)]);
    }
}
