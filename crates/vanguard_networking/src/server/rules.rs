//! # Game Rules
//!
//! The server tick owns sessions and replication; what happens inside a
//! match is delegated to a [`GameRules`] implementation. Rules only touch
//! the world through the component store API.

use std::collections::{HashMap, HashSet};

use vanguard_core::{AssetCatalog, Entity};
use vanguard_shared::movement::velocity_for;
use vanguard_shared::systems::{apply_damage, health_system, movement_system, pattern_system};
use vanguard_shared::{
    Capabilities, GameplayEvent, GameplayTuning, Health, InputSnapshot, LobbyScope, Pattern,
    Role, Score, ScoreValue, Sprite, Tags, Team, Transform, Velocity,
};

use super::world::ServerWorld;
use crate::protocol::InputPacket;
use crate::session::{ConnectionId, LobbyId};

/// Distance at which an enemy touches a player.
const CONTACT_RADIUS: f32 = 32.0;

/// Damage dealt to both sides of a contact.
const CONTACT_DAMAGE: i32 = 10;

/// Outcomes the server turns into messages or session transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RulesEvent {
    /// A player's entity died.
    PlayerDied {
        /// The player's lobby.
        lobby: LobbyId,
        /// The player.
        player: ConnectionId,
        /// GUID of the dead entity.
        guid: u64,
    },
    /// A player's score changed.
    ScoreChanged {
        /// The player's lobby.
        lobby: LobbyId,
        /// GUID of the player's entity.
        guid: u64,
        /// Score after the change.
        total: i32,
    },
    /// Nobody in the lobby is alive; the match should end.
    MatchOver(LobbyId),
}

/// Gameplay hooks called by the server tick.
pub trait GameRules {
    /// Spawns a match. Returns the entity GUID assigned to each player.
    fn on_match_start(
        &mut self,
        world: &mut ServerWorld,
        lobby: LobbyId,
        players: &[ConnectionId],
    ) -> Vec<(ConnectionId, u64)>;

    /// Receives input from an in-game player.
    fn on_input(&mut self, world: &mut ServerWorld, player: ConnectionId, packet: InputPacket);

    /// A player dropped out of a running match.
    fn on_player_left(&mut self, world: &mut ServerWorld, player: ConnectionId, lobby: LobbyId);

    /// A match ended or was abandoned; its entities should go.
    fn on_match_ended(&mut self, world: &mut ServerWorld, lobby: LobbyId);

    /// Advances every running match by `dt` seconds.
    fn tick(&mut self, world: &mut ServerWorld, dt: f32) -> Vec<RulesEvent>;
}

#[derive(Clone, Copy, Debug)]
struct PlayerSlot {
    entity: Entity,
    guid: u64,
    lobby: LobbyId,
    input: InputSnapshot,
    last_input_tick: Option<u32>,
    alive: bool,
}

/// Default rules: players move with their input, enemies follow patterns,
/// contact hurts both. A match is over when every player is dead.
#[derive(Debug)]
pub struct ArenaRules {
    tuning: GameplayTuning,
    players: HashMap<ConnectionId, PlayerSlot>,
    matches: HashSet<LobbyId>,
}

impl ArenaRules {
    /// Creates rules with the given tuning.
    #[must_use]
    pub fn new(tuning: GameplayTuning) -> Self {
        Self {
            tuning,
            players: HashMap::new(),
            matches: HashSet::new(),
        }
    }

    /// Tuning in use.
    #[must_use]
    pub const fn tuning(&self) -> &GameplayTuning {
        &self.tuning
    }

    /// Entity of a player, while it lives.
    #[must_use]
    pub fn player_entity(&self, player: ConnectionId) -> Option<Entity> {
        self.players
            .get(&player)
            .filter(|slot| slot.alive)
            .map(|slot| slot.entity)
    }

    /// Returns true while a match runs in `lobby`.
    #[must_use]
    pub fn is_running(&self, lobby: LobbyId) -> bool {
        self.matches.contains(&lobby)
    }

    /// Spawns an enemy that follows `pattern` inside `lobby`.
    ///
    /// # Returns
    ///
    /// The enemy's GUID.
    pub fn spawn_enemy(
        &mut self,
        world: &mut ServerWorld,
        lobby: LobbyId,
        at: (f32, f32),
        pattern: Pattern,
        hp: i32,
        points: i32,
    ) -> u64 {
        let (entity, guid) = world.spawn_networked(ConnectionId::SERVER, Some(LobbyScope(lobby.0)));
        let texture = world.assets.load_or_get_handle("enemy.png");
        world.attach(entity, Transform::at(at.0, at.1));
        world.attach(entity, pattern);
        world.attach(entity, Health::new(hp));
        world.attach(entity, ScoreValue { value: points });
        world.attach(entity, Team::Enemy);
        world.attach(entity, Tags::new(&["enemy"]));
        world.attach(
            entity,
            Sprite {
                texture,
                z_index: 1,
                width: 48.0,
                height: 48.0,
            },
        );
        guid
    }

    fn apply_inputs(&self, world: &mut ServerWorld) {
        for slot in self.players.values().filter(|slot| slot.alive) {
            let velocity = velocity_for(slot.input, self.tuning.player_speed);
            if let Ok(current) = world.registry.get::<Velocity>(slot.entity) {
                if *current == velocity {
                    continue;
                }
            }
            world.attach(slot.entity, velocity);
        }
    }

    fn resolve_contacts(&self, world: &mut ServerWorld) {
        let enemies: Vec<(Entity, Transform, Option<LobbyScope>)> = match world.registry.store::<Team>() {
            Some(store) => store
                .iter()
                .filter(|(_, team)| **team == Team::Enemy)
                .filter_map(|(entity, _)| {
                    let transform = world.registry.get::<Transform>(entity).ok()?;
                    let scope = world.registry.get::<LobbyScope>(entity).ok().copied();
                    Some((entity, *transform, scope))
                })
                .collect(),
            None => return,
        };

        for slot in self.players.values().filter(|slot| slot.alive) {
            let Ok(position) = world.registry.get::<Transform>(slot.entity).copied() else {
                continue;
            };
            for &(enemy, transform, scope) in &enemies {
                if scope.is_some_and(|scope| scope.0 != slot.lobby.0) {
                    continue;
                }
                if position.distance(&transform) <= CONTACT_RADIUS {
                    apply_damage(&mut world.registry, slot.entity, CONTACT_DAMAGE);
                    apply_damage(&mut world.registry, enemy, CONTACT_DAMAGE);
                }
            }
        }
    }

    fn finished_matches(&mut self) -> Vec<LobbyId> {
        let finished: Vec<LobbyId> = self
            .matches
            .iter()
            .copied()
            .filter(|&lobby| {
                !self
                    .players
                    .values()
                    .any(|slot| slot.lobby == lobby && slot.alive)
            })
            .collect();
        for lobby in &finished {
            self.matches.remove(lobby);
        }
        finished
    }
}

impl GameRules for ArenaRules {
    fn on_match_start(
        &mut self,
        world: &mut ServerWorld,
        lobby: LobbyId,
        players: &[ConnectionId],
    ) -> Vec<(ConnectionId, u64)> {
        let texture = world.assets.load_or_get_handle("player.png");
        let mut assignments = Vec::with_capacity(players.len());

        for (slot, &player) in players.iter().enumerate() {
            let (entity, guid) = world.spawn_networked(player, Some(LobbyScope(lobby.0)));
            let (x, y) = self.tuning.spawn_point(slot);
            world.attach(entity, Transform::at(x, y));
            world.attach(entity, Velocity::default());
            world.attach(entity, Health::new(self.tuning.player_max_hp));
            world.attach(entity, Score::default());
            world.attach(entity, Team::Ally);
            world.attach(entity, Tags::new(&["player"]));
            world.attach(
                entity,
                Sprite {
                    texture,
                    z_index: 2,
                    width: 64.0,
                    height: 32.0,
                },
            );

            self.players.insert(
                player,
                PlayerSlot {
                    entity,
                    guid,
                    lobby,
                    input: InputSnapshot::NONE,
                    last_input_tick: None,
                    alive: true,
                },
            );
            assignments.push((player, guid));
        }

        self.matches.insert(lobby);
        tracing::info!("{:?}: spawned {} players", lobby, players.len());
        assignments
    }

    fn on_input(&mut self, _world: &mut ServerWorld, player: ConnectionId, packet: InputPacket) {
        let Some(slot) = self.players.get_mut(&player) else {
            return;
        };
        // Unreliable channel: an older input arriving late is dropped.
        if slot.last_input_tick.is_some_and(|last| packet.tick < last) {
            return;
        }
        slot.last_input_tick = Some(packet.tick);
        slot.input = packet.input;
    }

    fn on_player_left(&mut self, world: &mut ServerWorld, player: ConnectionId, lobby: LobbyId) {
        if let Some(slot) = self.players.remove(&player) {
            if slot.alive {
                world.registry.destroy(slot.entity);
            }
            tracing::debug!("{:?} left {:?}, entity {:#018x} removed", player, lobby, slot.guid);
        }
    }

    fn on_match_ended(&mut self, world: &mut ServerWorld, lobby: LobbyId) {
        self.matches.remove(&lobby);
        self.players.retain(|_, slot| slot.lobby != lobby);
        let removed = world.despawn_scope(LobbyScope(lobby.0));
        tracing::info!("{:?}: match over, {} entities removed", lobby, removed);
    }

    fn tick(&mut self, world: &mut ServerWorld, dt: f32) -> Vec<RulesEvent> {
        if self.matches.is_empty() {
            return Vec::new();
        }

        self.apply_inputs(world);
        movement_system(&mut world.registry, dt);
        pattern_system(&mut world.registry, dt);
        self.resolve_contacts(world);

        let mut gameplay = Vec::new();
        health_system(
            &mut world.registry,
            Capabilities::for_role(Role::Server),
            &self.tuning,
            dt,
            &mut gameplay,
        );

        let mut events = Vec::new();
        for event in gameplay {
            match event {
                GameplayEvent::Died {
                    global_id: Some(guid),
                    ..
                } => {
                    let dead = self
                        .players
                        .iter_mut()
                        .find(|(_, slot)| slot.alive && slot.guid == guid);
                    if let Some((&player, slot)) = dead {
                        slot.alive = false;
                        events.push(RulesEvent::PlayerDied {
                            lobby: slot.lobby,
                            player,
                            guid,
                        });
                    }
                }
                GameplayEvent::Scored {
                    global_id: Some(guid),
                    total,
                    ..
                } => {
                    if let Some(slot) = self.players.values().find(|slot| slot.guid == guid) {
                        events.push(RulesEvent::ScoreChanged {
                            lobby: slot.lobby,
                            guid,
                            total,
                        });
                    }
                }
                _ => {}
            }
        }

        events.extend(self.finished_matches().into_iter().map(RulesEvent::MatchOver));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn started() -> (ServerWorld, ArenaRules, Vec<(ConnectionId, u64)>) {
        let mut world = ServerWorld::new(3);
        let mut rules = ArenaRules::new(GameplayTuning::default());
        let assigned = rules.on_match_start(
            &mut world,
            LobbyId(1),
            &[ConnectionId(1), ConnectionId(2)],
        );
        (world, rules, assigned)
    }

    #[test]
    fn test_players_spawn_at_spawn_points() {
        let (world, rules, assigned) = started();
        assert_eq!(assigned.len(), 2);
        let entity = world.entity_of(assigned[1].1).unwrap();
        let (x, y) = rules.tuning().spawn_point(1);
        assert_eq!(*world.registry.get::<Transform>(entity).unwrap(), Transform::at(x, y));
        assert_eq!(world.registry.get::<Health>(entity).unwrap().current_hp, 100);
        assert!(!world.registry.get::<Sprite>(entity).unwrap().texture.is_invalid());
        assert!(rules.is_running(LobbyId(1)));
    }

    #[test]
    fn test_input_moves_player() {
        let (mut world, mut rules, assigned) = started();
        let player = assigned[0].0;
        let entity = rules.player_entity(player).unwrap();
        let before = *world.registry.get::<Transform>(entity).unwrap();

        let input = InputSnapshot::NONE.with(vanguard_shared::Action::MoveRight);
        rules.on_input(&mut world, player, InputPacket { tick: 1, input });
        rules.tick(&mut world, DT);

        let after = world.registry.get::<Transform>(entity).unwrap();
        assert!((after.x - (before.x + 300.0 * DT)).abs() < 1e-3);
    }

    #[test]
    fn test_late_input_is_ignored() {
        let (mut world, mut rules, assigned) = started();
        let player = assigned[0].0;
        let right = InputSnapshot::NONE.with(vanguard_shared::Action::MoveRight);
        rules.on_input(&mut world, player, InputPacket { tick: 5, input: right });
        rules.on_input(&mut world, player, InputPacket { tick: 4, input: InputSnapshot::NONE });
        assert_eq!(rules.players[&player].input, right);
    }

    #[test]
    fn test_contact_kills_and_ends_match() {
        let (mut world, mut rules, assigned) = started();
        for &(player, _) in &assigned {
            let entity = rules.player_entity(player).unwrap();
            world.registry.get_mut::<Health>(entity).unwrap().current_hp = CONTACT_DAMAGE;
            let position = *world.registry.get::<Transform>(entity).unwrap();
            let still = Pattern::through(&[(position.x, position.y)], 0.0, false);
            rules.spawn_enemy(&mut world, LobbyId(1), (position.x, position.y), still, 50, 5);
        }

        let events = rules.tick(&mut world, DT);
        let deaths = events
            .iter()
            .filter(|event| matches!(event, RulesEvent::PlayerDied { .. }))
            .count();
        assert_eq!(deaths, 2);
        assert_eq!(events.last(), Some(&RulesEvent::MatchOver(LobbyId(1))));
        assert!(!rules.is_running(LobbyId(1)));
    }

    #[test]
    fn test_kill_reports_score_to_lobby() {
        let (mut world, mut rules, assigned) = started();
        let (player, guid) = assigned[0];
        let entity = rules.player_entity(player).unwrap();
        let position = *world.registry.get::<Transform>(entity).unwrap();
        let still = Pattern::through(&[(position.x, position.y)], 0.0, false);
        rules.spawn_enemy(&mut world, LobbyId(1), (position.x, position.y), still, 1, 25);

        let events = rules.tick(&mut world, DT);
        assert!(events.contains(&RulesEvent::ScoreChanged {
            lobby: LobbyId(1),
            guid,
            total: 25,
        }));
        assert_eq!(world.registry.get::<Score>(entity).unwrap().value, 25);
    }

    #[test]
    fn test_match_end_despawns_lobby() {
        let (mut world, mut rules, _) = started();
        rules.spawn_enemy(
            &mut world,
            LobbyId(1),
            (500.0, 500.0),
            Pattern::through(&[(0.0, 500.0)], 10.0, false),
            10,
            1,
        );
        rules.on_match_ended(&mut world, LobbyId(1));
        assert_eq!(world.registry.alive_count(), 0);
        assert!(rules.player_entity(ConnectionId(1)).is_none());
    }

    #[test]
    fn test_leaving_player_is_destroyed() {
        let (mut world, mut rules, assigned) = started();
        let (player, guid) = assigned[0];
        rules.on_player_left(&mut world, player, LobbyId(1));
        assert!(world.entity_of(guid).is_none());
        let destroyed = world.registry.drain_destroyed();
        assert_eq!(destroyed[0].global_id, Some(guid));
    }
}
