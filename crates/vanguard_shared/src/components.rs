//! # Gameplay Components
//!
//! Fixed-size components are `Pod` and cross the wire as a byte copy.
//! Variable-size components length-prefix every collection and string.
//!
//! ```text
//! Transform   [x f32][y f32][scale_x f32][scale_y f32][rotation f32]
//! Tags        [count u32]([len u32][utf8])*
//! Pattern     [kind u8][count u32]([x f32][y f32])*[index u32][speed f32]...
//! Resources   [count u32]([len u32][name][current f32][max f32][regen f32])*
//! Sprite      [len u32][texture name][z_index i32][width f32][height f32]
//! ```

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use vanguard_core::{
    replicate_pod, AssetCatalog, Component, NetworkIdentity, Registry, Replicated, ResourceHandle,
    ScopeComponent, WireReader, WireWriter,
};

/// 2D placement of an entity.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Transform {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
    /// Horizontal scale.
    pub scale_x: f32,
    /// Vertical scale.
    pub scale_y: f32,
    /// Rotation in degrees.
    pub rotation: f32,
}

impl Transform {
    /// Unscaled, unrotated transform at `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
        }
    }

    /// Euclidean distance between two positions.
    #[inline]
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

impl Component for Transform {
    const NAME: &'static str = "Transform";
}

/// Movement speed in world units per second.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Velocity {
    /// X velocity.
    pub vx: f32,
    /// Y velocity.
    pub vy: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }
}

impl Component for Velocity {
    const NAME: &'static str = "Velocity";
}

/// Hit points with a post-hit invincibility window.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Health {
    /// Maximum hit points.
    pub max_hp: i32,
    /// Current hit points; the entity dies at zero or below.
    pub current_hp: i32,
    /// Seconds of invincibility left.
    pub invincible_for: f32,
    /// Invincibility granted by each hit, in seconds.
    pub invincibility_duration: f32,
}

impl Health {
    /// Full health with a one-second invincibility window per hit.
    #[must_use]
    pub const fn new(max_hp: i32) -> Self {
        Self {
            max_hp,
            current_hp: max_hp,
            invincible_for: 0.0,
            invincibility_duration: 1.0,
        }
    }

    /// Returns true once hit points are exhausted.
    #[inline]
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current_hp <= 0
    }
}

impl Component for Health {
    const NAME: &'static str = "Health";
}

/// Running score of a player.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Score {
    /// Points accumulated.
    pub value: i32,
}

impl Component for Score {
    const NAME: &'static str = "Score";
}

/// Points awarded when this entity dies.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ScoreValue {
    /// Points awarded.
    pub value: i32,
}

impl Component for ScoreValue {
    const NAME: &'static str = "ScoreValue";
}

replicate_pod!(Transform, Velocity, Health, Score, ScoreValue);

/// Side an entity fights for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Team {
    /// Player side.
    #[default]
    Ally = 0,
    /// Hostile side.
    Enemy = 1,
}

impl Component for Team {
    const NAME: &'static str = "Team";
}

impl Replicated for Team {
    fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
        writer.write_u8(*self as u8);
    }

    fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
        match reader.read_u8()? {
            0 => Some(Self::Ally),
            1 => Some(Self::Enemy),
            _ => None,
        }
    }
}

/// Free-form labels used by collision filters and gameplay scripts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// Creates a tag set from string slices.
    #[must_use]
    pub fn new(tags: &[&str]) -> Self {
        Self(tags.iter().map(|tag| (*tag).to_owned()).collect())
    }

    /// Checks for a tag.
    #[must_use]
    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }
}

impl Component for Tags {
    const NAME: &'static str = "Tag";
}

impl Replicated for Tags {
    fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
        writer.write_len(self.0.len());
        for tag in &self.0 {
            writer.write_str(tag);
        }
    }

    fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
        let count = reader.read_len()?;
        let mut tags = Vec::with_capacity(count);
        for _ in 0..count {
            tags.push(reader.read_string()?);
        }
        Some(Self(tags))
    }
}

/// How a [`Pattern`] moves its entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PatternKind {
    /// Walk the waypoint list in order.
    #[default]
    Waypoint = 0,
    /// Move left at constant speed.
    Straight = 1,
    /// Move left while oscillating vertically.
    Sinusoidal = 2,
}

impl PatternKind {
    const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Waypoint),
            1 => Some(Self::Straight),
            2 => Some(Self::Sinusoidal),
            _ => None,
        }
    }
}

/// Scripted movement path for AI-driven entities.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Movement style.
    pub kind: PatternKind,
    /// Points to visit, in order.
    pub waypoints: Vec<(f32, f32)>,
    /// Next waypoint to reach.
    pub current_index: u32,
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Restart from the first waypoint after the last one.
    pub looping: bool,
    /// Inactive patterns leave the transform alone.
    pub active: bool,
    /// Vertical amplitude of sinusoidal motion.
    pub amplitude: f32,
    /// Frequency of sinusoidal motion.
    pub frequency: f32,
    /// Seconds since the pattern started.
    pub elapsed: f32,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            kind: PatternKind::Waypoint,
            waypoints: Vec::new(),
            current_index: 0,
            speed: 100.0,
            looping: false,
            active: true,
            amplitude: 50.0,
            frequency: 2.0,
            elapsed: 0.0,
        }
    }
}

impl Pattern {
    /// Waypoint pattern through `points`.
    #[must_use]
    pub fn through(points: &[(f32, f32)], speed: f32, looping: bool) -> Self {
        Self {
            waypoints: points.to_vec(),
            speed,
            looping,
            ..Self::default()
        }
    }
}

impl Component for Pattern {
    const NAME: &'static str = "Pattern";
}

impl Replicated for Pattern {
    fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
        writer.write_u8(self.kind as u8);
        writer.write_len(self.waypoints.len());
        for &(x, y) in &self.waypoints {
            writer.write_f32(x);
            writer.write_f32(y);
        }
        writer.write_u32(self.current_index);
        writer.write_f32(self.speed);
        writer.write_bool(self.looping);
        writer.write_bool(self.active);
        writer.write_f32(self.amplitude);
        writer.write_f32(self.frequency);
        writer.write_f32(self.elapsed);
    }

    fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
        let kind = PatternKind::from_u8(reader.read_u8()?)?;
        let count = reader.read_len()?;
        let mut waypoints = Vec::with_capacity(count);
        for _ in 0..count {
            waypoints.push((reader.read_f32()?, reader.read_f32()?));
        }
        Some(Self {
            kind,
            waypoints,
            current_index: reader.read_u32()?,
            speed: reader.read_f32()?,
            looping: reader.read_bool()?,
            active: reader.read_bool()?,
            amplitude: reader.read_f32()?,
            frequency: reader.read_f32()?,
            elapsed: reader.read_f32()?,
        })
    }
}

/// One depletable resource (ammo, shield, energy...).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct ResourceStat {
    /// Current amount.
    pub current: f32,
    /// Upper bound.
    pub max: f32,
    /// Amount regained per second.
    pub regen_rate: f32,
}

/// Named resource gauges of an entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourcePool {
    /// Gauges keyed by name, iterated in name order.
    pub resources: BTreeMap<String, ResourceStat>,
}

impl ResourcePool {
    /// Regenerates every gauge by `dt` seconds, clamped to its max.
    pub fn regenerate(&mut self, dt: f32) {
        for stat in self.resources.values_mut() {
            stat.current = (stat.current + stat.regen_rate * dt).min(stat.max);
        }
    }
}

impl Component for ResourcePool {
    const NAME: &'static str = "Resource";
}

impl Replicated for ResourcePool {
    fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
        writer.write_len(self.resources.len());
        for (name, stat) in &self.resources {
            writer.write_str(name);
            writer.write_pod(stat);
        }
    }

    fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
        let count = reader.read_len()?;
        let mut resources = BTreeMap::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            resources.insert(name, reader.read_pod()?);
        }
        Some(Self { resources })
    }
}

/// Visual representation; the texture is resolved by the asset catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sprite {
    /// Texture handle, local to each process.
    pub texture: ResourceHandle,
    /// Draw order; higher draws on top.
    pub z_index: i32,
    /// Drawn width.
    pub width: f32,
    /// Drawn height.
    pub height: f32,
}

impl Component for Sprite {
    const NAME: &'static str = "Sprite";
}

impl Replicated for Sprite {
    fn encode(&self, writer: &mut WireWriter, assets: &dyn AssetCatalog) {
        writer.write_str(assets.name_of(self.texture).unwrap_or_default());
        writer.write_i32(self.z_index);
        writer.write_f32(self.width);
        writer.write_f32(self.height);
    }

    fn decode(reader: &mut WireReader<'_>, assets: &mut dyn AssetCatalog) -> Option<Self> {
        let name = reader.read_string()?;
        let texture = if name.is_empty() {
            ResourceHandle::INVALID
        } else {
            assets.load_or_get_handle(&name)
        };
        Some(Self {
            texture,
            z_index: reader.read_i32()?,
            width: reader.read_f32()?,
            height: reader.read_f32()?,
        })
    }
}

/// Lobby an entity belongs to; scopes replication on the server. Never sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LobbyScope(pub u32);

impl Component for LobbyScope {
    const NAME: &'static str = "LobbyScope";
}

impl ScopeComponent for LobbyScope {
    fn scope_id(&self) -> u32 {
        self.0
    }
}

/// Client-side damage feedback. Never sent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HitFlash {
    /// Seconds of flashing left.
    pub remaining: f32,
    /// Hit points seen on the previous frame.
    pub last_hp: i32,
}

impl Component for HitFlash {
    const NAME: &'static str = "HitFlash";
}

/// Attaches wire encoders for every replicated gameplay component.
pub fn register_replicated_components(registry: &mut Registry) {
    registry.register_replicated::<NetworkIdentity>();
    registry.register_replicated::<Transform>();
    registry.register_replicated::<Velocity>();
    registry.register_replicated::<Health>();
    registry.register_replicated::<Score>();
    registry.register_replicated::<ScoreValue>();
    registry.register_replicated::<Team>();
    registry.register_replicated::<Tags>();
    registry.register_replicated::<Pattern>();
    registry.register_replicated::<ResourcePool>();
    registry.register_replicated::<Sprite>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use vanguard_core::{ComponentTypeId, ErasedStore, NoAssets, ResourceManager};

    fn roundtrip<C: Replicated>(value: &C) -> Option<C> {
        let mut writer = WireWriter::new();
        value.encode(&mut writer, &NoAssets);
        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes);
        let decoded = C::decode(&mut reader, &mut NoAssets);
        assert!(reader.is_exhausted(), "{} left bytes unread", C::NAME);
        decoded
    }

    #[test]
    fn test_transform_is_byte_copy() {
        let transform = Transform::at(10.0, -4.5);
        let mut writer = WireWriter::new();
        transform.encode(&mut writer, &NoAssets);
        assert_eq!(writer.len(), 20);
        assert_eq!(writer.as_slice(), bytemuck::bytes_of(&transform));
    }

    #[test]
    fn test_scalar_components_survive() {
        let mut health = Health::new(250);
        health.current_hp = 90;
        health.invincible_for = 0.25;
        assert_eq!(roundtrip(&health), Some(health));
        assert_eq!(
            roundtrip(&Velocity::new(-3.5, 12.0)),
            Some(Velocity::new(-3.5, 12.0))
        );
        assert_eq!(roundtrip(&Score { value: -40 }), Some(Score { value: -40 }));
        assert_eq!(
            roundtrip(&ScoreValue { value: 500 }),
            Some(ScoreValue { value: 500 })
        );

        let identity = NetworkIdentity::new(0xDEAD_BEEF_0000_0001, 7);
        let mut writer = WireWriter::new();
        identity.encode(&mut writer, &NoAssets);
        assert_eq!(writer.len(), 12);
        assert_eq!(roundtrip(&identity), Some(identity));
    }

    #[test]
    fn test_empty_collections_survive() {
        assert_eq!(roundtrip(&Tags::default()), Some(Tags::default()));
        assert_eq!(roundtrip(&Pattern::default()), Some(Pattern::default()));
        assert_eq!(
            roundtrip(&ResourcePool::default()),
            Some(ResourcePool::default())
        );
    }

    #[test]
    fn test_populated_collections_survive() {
        let tags = Tags::new(&["enemy", "boss"]);
        assert_eq!(roundtrip(&tags), Some(tags.clone()));
        assert!(tags.has("boss"));

        let mut pattern = Pattern::through(&[(0.0, 1.0), (5.0, 5.0), (9.5, -3.0)], 80.0, true);
        pattern.kind = PatternKind::Sinusoidal;
        pattern.current_index = 2;
        assert_eq!(roundtrip(&pattern), Some(pattern));

        let mut pool = ResourcePool::default();
        pool.resources.insert(
            "shield".into(),
            ResourceStat {
                current: 3.0,
                max: 10.0,
                regen_rate: 0.5,
            },
        );
        pool.resources.insert("ammo".into(), ResourceStat::default());
        assert_eq!(roundtrip(&pool), Some(pool));
    }

    #[test]
    fn test_truncated_tags_rejected() {
        let mut writer = WireWriter::new();
        Tags::new(&["player"]).encode(&mut writer, &NoAssets);
        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes[..bytes.len() - 1]);
        assert!(Tags::decode(&mut reader, &mut NoAssets).is_none());
    }

    #[test]
    fn test_team_rejects_unknown_discriminant() {
        let bytes = [7u8];
        assert!(Team::decode(&mut WireReader::new(&bytes), &mut NoAssets).is_none());
        assert_eq!(roundtrip(&Team::Enemy), Some(Team::Enemy));
    }

    #[test]
    fn test_sprite_travels_by_name() {
        let mut server_assets = ResourceManager::new(|path: &str| Some(path.len()));
        let mut client_assets = ResourceManager::new(|path: &str| Some(path.len()));
        // Offset the client's slots so handles differ between the peers.
        client_assets.load_or_get_handle("background.png");

        let sprite = Sprite {
            texture: server_assets.load_or_get_handle("ship.png"),
            z_index: 3,
            width: 32.0,
            height: 16.0,
        };

        let mut writer = WireWriter::new();
        sprite.encode(&mut writer, &server_assets);
        let bytes = writer.into_bytes();
        let decoded = Sprite::decode(&mut WireReader::new(&bytes), &mut client_assets).unwrap();

        assert_ne!(decoded.texture, sprite.texture);
        assert_eq!(client_assets.name_of(decoded.texture), Some("ship.png"));
        assert_eq!(decoded.z_index, 3);
    }

    #[test]
    fn test_sprite_without_texture() {
        let decoded = roundtrip(&Sprite::default()).unwrap();
        assert!(decoded.texture.is_invalid());
    }

    #[test]
    fn test_registration_marks_stores_replicated() {
        let mut registry = Registry::new();
        register_replicated_components(&mut registry);
        for name in ["Transform", "Tag", "Pattern", "Resource", "Sprite", "NetworkIdentity"] {
            let store = registry
                .store_by_type_id(ComponentTypeId::from_name(name))
                .unwrap();
            assert!(store.is_replicated(), "{name} not replicated");
        }
        assert!(registry.store::<LobbyScope>().is_none());
    }

    #[test]
    fn test_regenerate_clamps() {
        let mut pool = ResourcePool::default();
        pool.resources.insert(
            "energy".into(),
            ResourceStat {
                current: 9.0,
                max: 10.0,
                regen_rate: 4.0,
            },
        );
        pool.regenerate(1.0);
        assert!((pool.resources["energy"].current - 10.0).abs() < f32::EPSILON);
    }
}
