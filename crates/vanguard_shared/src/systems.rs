//! # Shared Systems
//!
//! Each system exists once. Effects that only make sense on one side of the
//! network are gated by [`Capabilities`] derived from the process [`Role`]:
//!
//! ```text
//!              server_effects        client_effects
//! Server            yes                   no
//! Client            no                    yes
//! Standalone        yes                   yes
//! ```

use vanguard_core::{Entity, NetworkIdentity, Registry};

use crate::components::{
    Health, HitFlash, LobbyScope, Pattern, PatternKind, Score, ScoreValue, Team, Transform,
    Velocity,
};
use crate::movement::integrate;
use crate::tuning::GameplayTuning;

/// Distance at which a waypoint counts as reached.
const WAYPOINT_TOLERANCE: f32 = 5.0;

/// What kind of process is running the simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Role {
    /// Authoritative server.
    Server = 0,
    /// Networked client.
    Client = 1,
    /// Offline single-process game.
    #[default]
    Standalone = 2,
}

/// Side effects a process is allowed to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Authoritative effects: death, scoring, despawn.
    pub server_effects: bool,
    /// Presentation effects: hit flashes and similar feedback.
    pub client_effects: bool,
}

impl Capabilities {
    /// Capability set of a role.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Server => Self {
                server_effects: true,
                client_effects: false,
            },
            Role::Client => Self {
                server_effects: false,
                client_effects: true,
            },
            Role::Standalone => Self {
                server_effects: true,
                client_effects: true,
            },
        }
    }
}

/// Gameplay outcomes surfaced to the caller of a system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameplayEvent {
    /// An entity lost hit points.
    Damaged {
        /// The damaged entity.
        entity: Entity,
        /// Hit points lost.
        amount: i32,
    },
    /// An entity died and was destroyed.
    Died {
        /// The destroyed entity.
        entity: Entity,
        /// Its network GUID, if replicated.
        global_id: Option<u64>,
        /// Points awarded to the players.
        awarded: i32,
    },
    /// A player's score changed.
    Scored {
        /// The scoring entity.
        entity: Entity,
        /// Its network GUID, if replicated.
        global_id: Option<u64>,
        /// Score after the award.
        total: i32,
    },
}

/// Applies damage unless the target is invincible.
///
/// # Returns
///
/// `true` if hit points were removed.
pub fn apply_damage(registry: &mut Registry, entity: Entity, amount: i32) -> bool {
    let Ok(health) = registry.get_mut::<Health>(entity) else {
        return false;
    };
    if health.invincible_for > 0.0 || health.is_dead() {
        return false;
    }
    health.current_hp -= amount;
    health.invincible_for = health.invincibility_duration;
    true
}

/// Integrates every `Velocity` into its `Transform`.
pub fn movement_system(registry: &mut Registry, dt: f32) {
    let moving: Vec<(Entity, Velocity)> = match registry.store::<Velocity>() {
        Some(store) => store
            .iter()
            .filter(|(_, velocity)| velocity.vx != 0.0 || velocity.vy != 0.0)
            .map(|(entity, velocity)| (entity, *velocity))
            .collect(),
        None => return,
    };

    for (entity, velocity) in moving {
        if let Ok(transform) = registry.get_mut::<Transform>(entity) {
            *transform = integrate(transform, velocity, dt);
        }
    }
}

/// Pattern fields that move as the pattern runs.
#[derive(Clone, Copy, PartialEq)]
struct PatternProgress {
    elapsed: f32,
    current_index: u32,
    active: bool,
}

impl PatternProgress {
    const fn of(pattern: &Pattern) -> Self {
        Self {
            elapsed: pattern.elapsed,
            current_index: pattern.current_index,
            active: pattern.active,
        }
    }

    fn store(self, pattern: &mut Pattern) {
        pattern.elapsed = self.elapsed;
        pattern.current_index = self.current_index;
        pattern.active = self.active;
    }
}

/// Drives entities along their [`Pattern`].
///
/// Only components whose value actually changes are written back, so idle
/// patterns never reach the dirty sets.
pub fn pattern_system(registry: &mut Registry, dt: f32) {
    let entities: Vec<Entity> = match registry.store::<Pattern>() {
        Some(store) => store.entities().to_vec(),
        None => return,
    };

    for entity in entities {
        let Ok(transform) = registry.get::<Transform>(entity).copied() else {
            continue;
        };
        let Ok(pattern) = registry.get::<Pattern>(entity) else {
            continue;
        };
        if !pattern.active {
            continue;
        }
        let before = PatternProgress::of(pattern);
        let (next, progress) = advance_pattern(pattern, transform, dt);

        if progress != before {
            if let Ok(pattern) = registry.get_mut::<Pattern>(entity) {
                progress.store(pattern);
            }
        }
        if next != transform {
            if let Ok(slot) = registry.get_mut::<Transform>(entity) {
                *slot = next;
            }
        }
    }
}

fn advance_pattern(
    pattern: &Pattern,
    mut transform: Transform,
    dt: f32,
) -> (Transform, PatternProgress) {
    let mut progress = PatternProgress::of(pattern);
    match pattern.kind {
        PatternKind::Straight => {
            transform.x -= pattern.speed * dt;
            return (transform, progress);
        }
        PatternKind::Sinusoidal => {
            progress.elapsed += dt;
            transform.x -= pattern.speed * dt;
            transform.y += pattern.amplitude
                * pattern.frequency
                * (progress.elapsed * pattern.frequency).cos()
                * dt;
            return (transform, progress);
        }
        PatternKind::Waypoint => {}
    }

    let Some(&(tx, ty)) = pattern.waypoints.get(pattern.current_index as usize) else {
        return (transform, progress);
    };
    let dx = tx - transform.x;
    let dy = ty - transform.y;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance <= WAYPOINT_TOLERANCE {
        progress.current_index += 1;
        if progress.current_index as usize >= pattern.waypoints.len() {
            if pattern.looping {
                progress.current_index = 0;
            } else {
                progress.active = false;
            }
        }
        return (transform, progress);
    }

    let step = pattern.speed * dt;
    if step >= distance {
        transform.x = tx;
        transform.y = ty;
    } else {
        transform.x += dx / distance * step;
        transform.y += dy / distance * step;
    }
    (transform, progress)
}

/// Ticks invincibility, then applies death and feedback effects.
///
/// Server effects destroy dead entities and award their [`ScoreValue`] to
/// every allied [`Score`] holder sharing the dead entity's [`LobbyScope`].
/// Client effects flash damaged entities.
pub fn health_system(
    registry: &mut Registry,
    capabilities: Capabilities,
    tuning: &GameplayTuning,
    dt: f32,
    events: &mut Vec<GameplayEvent>,
) {
    let entities: Vec<Entity> = match registry.store::<Health>() {
        Some(store) => store.entities().to_vec(),
        None => return,
    };

    let mut dead = Vec::new();
    for &entity in &entities {
        let Ok(health) = registry.get::<Health>(entity).copied() else {
            continue;
        };
        if capabilities.server_effects && health.invincible_for > 0.0 {
            if let Ok(health) = registry.get_mut::<Health>(entity) {
                health.invincible_for = (health.invincible_for - dt).max(0.0);
            }
        }
        if capabilities.client_effects {
            flash_on_damage(registry, entity, health.current_hp, tuning, dt, events);
        }
        if capabilities.server_effects && health.is_dead() {
            dead.push(entity);
        }
    }

    for entity in dead {
        let awarded = registry
            .get::<ScoreValue>(entity)
            .map_or(0, |score| score.value);
        let global_id = registry
            .get::<NetworkIdentity>(entity)
            .ok()
            .map(|identity| identity.global_id);
        if awarded != 0 {
            let scope = registry.get::<LobbyScope>(entity).ok().copied();
            award_allies(registry, scope, awarded, events);
        }
        registry.destroy(entity);
        tracing::debug!("entity {} died, {} points awarded", entity, awarded);
        events.push(GameplayEvent::Died {
            entity,
            global_id,
            awarded,
        });
    }
}

fn flash_on_damage(
    registry: &mut Registry,
    entity: Entity,
    current_hp: i32,
    tuning: &GameplayTuning,
    dt: f32,
    events: &mut Vec<GameplayEvent>,
) {
    let mut flash = registry.get::<HitFlash>(entity).copied().unwrap_or(HitFlash {
        remaining: 0.0,
        last_hp: current_hp,
    });
    flash.remaining = (flash.remaining - dt).max(0.0);
    if current_hp < flash.last_hp {
        flash.remaining = tuning.hit_flash_secs;
        events.push(GameplayEvent::Damaged {
            entity,
            amount: flash.last_hp - current_hp,
        });
    }
    flash.last_hp = current_hp;
    if let Err(err) = registry.add(entity, flash) {
        tracing::warn!("hit flash on {} dropped: {}", entity, err);
    }
}

fn award_allies(
    registry: &mut Registry,
    scope: Option<LobbyScope>,
    points: i32,
    events: &mut Vec<GameplayEvent>,
) {
    let allies: Vec<Entity> = match registry.store::<Score>() {
        Some(store) => store
            .entities()
            .iter()
            .copied()
            .filter(|&entity| !matches!(registry.get::<Team>(entity), Ok(Team::Enemy)))
            .filter(|&entity| registry.get::<LobbyScope>(entity).ok().copied() == scope)
            .collect(),
        None => return,
    };
    for entity in allies {
        let Ok(score) = registry.get_mut::<Score>(entity) else {
            continue;
        };
        score.value += points;
        let total = score.value;
        let global_id = registry
            .get::<NetworkIdentity>(entity)
            .ok()
            .map(|identity| identity.global_id);
        events.push(GameplayEvent::Scored {
            entity,
            global_id,
            total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_with_health(registry: &mut Registry, hp: i32) -> Entity {
        let entity = registry.create();
        registry.add(entity, Health::new(hp)).unwrap();
        entity
    }

    #[test]
    fn test_capabilities_per_role() {
        assert!(Capabilities::for_role(Role::Server).server_effects);
        assert!(!Capabilities::for_role(Role::Server).client_effects);
        assert!(!Capabilities::for_role(Role::Client).server_effects);
        let standalone = Capabilities::for_role(Role::Standalone);
        assert!(standalone.server_effects && standalone.client_effects);
    }

    #[test]
    fn test_damage_respects_invincibility() {
        let mut registry = Registry::new();
        let entity = spawn_with_health(&mut registry, 10);
        assert!(apply_damage(&mut registry, entity, 4));
        assert!(!apply_damage(&mut registry, entity, 4));
        assert_eq!(registry.get::<Health>(entity).unwrap().current_hp, 6);
    }

    #[test]
    fn test_server_destroys_dead_and_awards_score() {
        let mut registry = Registry::new();
        let player = registry.create();
        registry.add(player, Score::default()).unwrap();
        registry.add(player, Team::Ally).unwrap();

        let enemy = spawn_with_health(&mut registry, 1);
        registry.add(enemy, ScoreValue { value: 50 }).unwrap();
        registry.add(enemy, NetworkIdentity::new(77, 0)).unwrap();
        apply_damage(&mut registry, enemy, 5);

        let mut events = Vec::new();
        health_system(
            &mut registry,
            Capabilities::for_role(Role::Server),
            &GameplayTuning::default(),
            0.016,
            &mut events,
        );

        assert!(!registry.is_alive(enemy));
        assert_eq!(registry.get::<Score>(player).unwrap().value, 50);
        assert_eq!(
            events,
            vec![
                GameplayEvent::Scored {
                    entity: player,
                    global_id: None,
                    total: 50
                },
                GameplayEvent::Died {
                    entity: enemy,
                    global_id: Some(77),
                    awarded: 50
                }
            ]
        );
        assert_eq!(registry.drain_destroyed()[0].global_id, Some(77));
    }

    #[test]
    fn test_award_stays_in_the_dead_entity_lobby() {
        let mut registry = Registry::new();
        let mut player_in = |lobby: u32| {
            let player = registry.create();
            registry.add(player, Score::default()).unwrap();
            registry.add(player, Team::Ally).unwrap();
            registry.add(player, LobbyScope(lobby)).unwrap();
            player
        };
        let here = player_in(1);
        let elsewhere = player_in(2);

        let enemy = spawn_with_health(&mut registry, 1);
        registry.add(enemy, ScoreValue { value: 30 }).unwrap();
        registry.add(enemy, LobbyScope(1)).unwrap();
        apply_damage(&mut registry, enemy, 5);

        let mut events = Vec::new();
        health_system(
            &mut registry,
            Capabilities::for_role(Role::Server),
            &GameplayTuning::default(),
            0.016,
            &mut events,
        );

        assert_eq!(registry.get::<Score>(here).unwrap().value, 30);
        assert_eq!(registry.get::<Score>(elsewhere).unwrap().value, 0);
        let scored: Vec<Entity> = events
            .iter()
            .filter_map(|event| match event {
                GameplayEvent::Scored { entity, .. } => Some(*entity),
                _ => None,
            })
            .collect();
        assert_eq!(scored, vec![here]);
    }

    #[test]
    fn test_client_never_destroys_but_flashes() {
        let mut registry = Registry::new();
        let entity = spawn_with_health(&mut registry, 10);
        let client = Capabilities::for_role(Role::Client);
        let tuning = GameplayTuning::default();
        let mut events = Vec::new();

        health_system(&mut registry, client, &tuning, 0.016, &mut events);
        assert!(events.is_empty());

        // Replicated update arrives with lower hp.
        registry.get_mut::<Health>(entity).unwrap().current_hp = 0;
        health_system(&mut registry, client, &tuning, 0.016, &mut events);

        assert!(registry.is_alive(entity));
        assert_eq!(
            events,
            vec![GameplayEvent::Damaged {
                entity,
                amount: 10
            }]
        );
        let flash = registry.get::<HitFlash>(entity).unwrap();
        assert!((flash.remaining - tuning.hit_flash_secs).abs() < f32::EPSILON);
    }

    #[test]
    fn test_movement_system_integrates() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Transform::at(0.0, 0.0)).unwrap();
        registry.add(entity, Velocity::new(2.0, -1.0)).unwrap();
        movement_system(&mut registry, 0.5);
        let transform = registry.get::<Transform>(entity).unwrap();
        assert!((transform.x - 1.0).abs() < f32::EPSILON);
        assert!((transform.y + 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_waypoint_pattern_reaches_end() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Transform::at(0.0, 0.0)).unwrap();
        registry
            .add(entity, Pattern::through(&[(10.0, 0.0)], 100.0, false))
            .unwrap();

        // Overshoot snaps onto the waypoint.
        pattern_system(&mut registry, 1.0);
        assert!((registry.get::<Transform>(entity).unwrap().x - 10.0).abs() < f32::EPSILON);

        // Next tick registers arrival and deactivates the pattern.
        pattern_system(&mut registry, 1.0);
        assert!(!registry.get::<Pattern>(entity).unwrap().active);
    }

    #[test]
    fn test_idle_patterns_stay_clean() {
        let mut registry = Registry::new();
        let finished = registry.create();
        registry.add(finished, Transform::at(10.0, 0.0)).unwrap();
        let mut done = Pattern::through(&[(10.0, 0.0)], 100.0, false);
        done.active = false;
        registry.add(finished, done).unwrap();

        let parked = registry.create();
        registry.add(parked, Transform::at(30.0, 0.0)).unwrap();
        let still = Pattern {
            kind: PatternKind::Straight,
            speed: 0.0,
            ..Pattern::default()
        };
        registry.add(parked, still).unwrap();

        registry.store_mut::<Pattern>().drain_dirty();
        registry.store_mut::<Transform>().drain_dirty();
        pattern_system(&mut registry, 0.5);

        assert!(registry.store_mut::<Pattern>().drain_dirty().is_empty());
        assert!(registry.store_mut::<Transform>().drain_dirty().is_empty());
    }

    #[test]
    fn test_moving_pattern_dirties_transform_only() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Transform::at(0.0, 0.0)).unwrap();
        registry
            .add(entity, Pattern::through(&[(100.0, 0.0)], 10.0, false))
            .unwrap();
        registry.store_mut::<Pattern>().drain_dirty();
        registry.store_mut::<Transform>().drain_dirty();

        pattern_system(&mut registry, 1.0);
        assert!(!registry.store_mut::<Pattern>().is_dirty(entity));
        assert!(registry.store_mut::<Transform>().is_dirty(entity));
    }

    #[test]
    fn test_straight_pattern_moves_left() {
        let mut registry = Registry::new();
        let entity = registry.create();
        registry.add(entity, Transform::at(50.0, 5.0)).unwrap();
        let pattern = Pattern {
            kind: PatternKind::Straight,
            speed: 10.0,
            ..Pattern::default()
        };
        registry.add(entity, pattern).unwrap();
        pattern_system(&mut registry, 1.0);
        assert!((registry.get::<Transform>(entity).unwrap().x - 40.0).abs() < f32::EPSILON);
    }
}
