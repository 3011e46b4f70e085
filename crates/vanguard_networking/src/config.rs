//! # Configuration
//!
//! Server and client settings. Every field has a default; a TOML file only
//! needs the keys it changes.
//!
//! ```toml
//! tick_rate = 30
//! max_connections = 64
//!
//! [gameplay]
//! player_speed = 250.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use vanguard_shared::GameplayTuning;

use crate::error::ConfigError;
use crate::prediction::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SNAP_THRESHOLD};
use crate::{DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_PLAYERS, DEFAULT_TICK_RATE};

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Connections accepted before new ones are refused.
    pub max_connections: usize,
    /// Lobby capacity.
    pub max_players_per_lobby: usize,
    /// Seed for GUIDs, tokens and the credential digest key.
    pub seed: u64,
    /// Capacity of each transport queue.
    pub queue_capacity: usize,
    /// Gameplay constants.
    pub gameplay: GameplayTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_players_per_lobby: DEFAULT_MAX_PLAYERS,
            seed: 0x5EED,
            queue_capacity: 1024,
            gameplay: GameplayTuning::default(),
        }
    }
}

impl ServerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` for bad TOML, `Invalid` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Seconds per tick.
    #[must_use]
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be positive".into()));
        }
        if self.max_players_per_lobby == 0 {
            return Err(ConfigError::Invalid(
                "max_players_per_lobby must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Frames per second the client steps prediction at.
    pub tick_rate: u32,
    /// Predicted steps kept for reconciliation.
    pub history_capacity: usize,
    /// Divergence, in world units, above which prediction snaps.
    pub snap_threshold: f32,
    /// Gameplay constants; must match the server's.
    pub gameplay: GameplayTuning,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            gameplay: GameplayTuning::default(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` for bad TOML, `Invalid` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        if config.tick_rate == 0 || config.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "tick_rate and history_capacity must be positive".into(),
            ));
        }
        if config.snap_threshold.is_nan() || config.snap_threshold < 0.0 {
            return Err(ConfigError::Invalid("snap_threshold must be non-negative".into()));
        }
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Seconds per frame.
    #[must_use]
    pub fn tick_duration(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
