//! # Movement
//!
//! The player movement step. The server runs it authoritatively and the
//! client runs the very same function to predict, so both peers agree
//! whenever they see the same inputs.

use crate::components::{Transform, Velocity};
use crate::input::InputSnapshot;

/// Velocity a player moving at `speed` gets from `input`.
#[inline]
#[must_use]
pub fn velocity_for(input: InputSnapshot, speed: f32) -> Velocity {
    Velocity::new(input.horizontal() * speed, input.vertical() * speed)
}

/// Advances a transform by a velocity over `dt` seconds.
#[inline]
#[must_use]
pub fn integrate(transform: &Transform, velocity: Velocity, dt: f32) -> Transform {
    Transform {
        x: transform.x + velocity.vx * dt,
        y: transform.y + velocity.vy * dt,
        ..*transform
    }
}

/// One deterministic player step.
///
/// # Arguments
///
/// * `transform` - State before the step
/// * `input` - Actions held during the step
/// * `speed` - Player speed in world units per second
/// * `dt` - Step duration in seconds
#[must_use]
pub fn step_player(transform: &Transform, input: InputSnapshot, speed: f32, dt: f32) -> Transform {
    integrate(transform, velocity_for(input, speed), dt)
}
