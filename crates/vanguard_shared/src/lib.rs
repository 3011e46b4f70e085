//! # VANGUARD Shared
//!
//! Gameplay types used by both client and server.
//!
//! - `components`: replicated gameplay data and their wire layouts
//! - `input`: the per-tick input snapshot clients send and predict with
//! - `movement`: the one movement step both peers run
//! - `systems`: health, pattern and movement systems behind a role capability set
//! - `tuning`: gameplay constants loadable from config files
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on windowing, audio or GPU crates.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod components;
pub mod input;
pub mod movement;
pub mod systems;
pub mod tuning;

pub use components::{
    register_replicated_components, Health, HitFlash, LobbyScope, Pattern, PatternKind,
    ResourcePool, ResourceStat, Score, ScoreValue, Sprite, Tags, Team, Transform, Velocity,
};
pub use input::{Action, InputSnapshot};
pub use movement::step_player;
pub use systems::{Capabilities, GameplayEvent, Role};
pub use tuning::GameplayTuning;
