//! Gameplay tuning constants.

use serde::{Deserialize, Serialize};

/// Gameplay constants shared by server simulation and client prediction.
///
/// Loaded as a `[gameplay]` table from config files; every field has a
/// default so partial tables are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayTuning {
    /// Player speed in world units per second.
    pub player_speed: f32,
    /// Hit points players spawn with.
    pub player_max_hp: i32,
    /// Seconds a damaged entity flashes on clients.
    pub hit_flash_secs: f32,
    /// Player spawn positions, assigned in join order.
    pub spawn_points: Vec<(f32, f32)>,
}

impl Default for GameplayTuning {
    fn default() -> Self {
        Self {
            player_speed: 300.0,
            player_max_hp: 100,
            hit_flash_secs: 0.2,
            spawn_points: vec![(100.0, 100.0), (100.0, 200.0), (100.0, 300.0), (100.0, 400.0)],
        }
    }
}

impl GameplayTuning {
    /// Spawn position for the `slot`-th player, wrapping around the list.
    #[must_use]
    pub fn spawn_point(&self, slot: usize) -> (f32, f32) {
        if self.spawn_points.is_empty() {
            return (0.0, 0.0);
        }
        self.spawn_points[slot % self.spawn_points.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_uses_defaults() {
        let tuning: GameplayTuning = toml::from_str("player_speed = 120.0").unwrap();
        assert!((tuning.player_speed - 120.0).abs() < f32::EPSILON);
        assert_eq!(tuning.player_max_hp, 100);
        assert_eq!(tuning.spawn_points.len(), 4);
    }

    #[test]
    fn test_spawn_point_wraps() {
        let tuning = GameplayTuning {
            spawn_points: vec![(1.0, 1.0), (2.0, 2.0)],
            ..GameplayTuning::default()
        };
        assert_eq!(tuning.spawn_point(3), (2.0, 2.0));
        let empty = GameplayTuning {
            spawn_points: Vec::new(),
            ..GameplayTuning::default()
        };
        assert_eq!(empty.spawn_point(0), (0.0, 0.0));
    }
}
