//! # Client Prediction
//!
//! The client moves its own player immediately and keeps every predicted
//! step. When the server's transform for tick T arrives, steps before T are
//! history and the first remaining step is compared against it:
//!
//! ```text
//! history:  [T:(10,0)] [T+1:(20,0)] [T+2:(30,0)]
//! server T: (10.2, 0)  -> within threshold, keep (30,0)       (soft)
//! server T: (50, 0)    -> snap to (50,0), replay T+1, T+2     (snap)
//! ```
//!
//! Replay uses [`step_player`], the same function the server moves players
//! with, so a replayed history matches what the server will compute.

use std::collections::VecDeque;

use vanguard_core::Component;
use vanguard_shared::{step_player, InputSnapshot, Transform};

/// Default number of steps kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 120;

/// Default divergence, in world units, above which the client snaps.
pub const DEFAULT_SNAP_THRESHOLD: f32 = 1.0;

/// One locally simulated step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PredictedStep {
    /// Tick the input was sent for.
    pub tick: u32,
    /// Input held during the step.
    pub input: InputSnapshot,
    /// Step duration in seconds.
    pub dt: f32,
    /// Transform after the step.
    pub state: Transform,
}

/// Outcome of a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Correction {
    /// Prediction diverged; the state was reset and history replayed.
    Snap {
        /// Transform to display now.
        state: Transform,
        /// Steps replayed on top of the authoritative state.
        replayed: usize,
    },
    /// Prediction was close enough; the latest prediction stands.
    Soft {
        /// Transform to display now.
        state: Transform,
        /// Distance between prediction and server for the compared tick.
        error: f32,
    },
}

impl Correction {
    /// Transform the player should have after the correction.
    #[must_use]
    pub const fn state(&self) -> Transform {
        match self {
            Self::Snap { state, .. } | Self::Soft { state, .. } => *state,
        }
    }
}

/// Bounded history of predicted steps. A local component, never replicated.
#[derive(Clone, Debug)]
pub struct PredictionHistory {
    steps: VecDeque<PredictedStep>,
    capacity: usize,
    threshold: f32,
}

impl Component for PredictionHistory {
    const NAME: &'static str = "PredictionHistory";
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_SNAP_THRESHOLD)
    }
}

impl PredictionHistory {
    /// Creates a history of at most `capacity` steps.
    #[must_use]
    pub fn new(capacity: usize, threshold: f32) -> Self {
        let capacity = capacity.max(1);
        Self {
            steps: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
        }
    }

    /// Appends a step, evicting the oldest when full.
    pub fn record(&mut self, step: PredictedStep) {
        if self.steps.len() == self.capacity {
            self.steps.pop_front();
        }
        self.steps.push_back(step);
    }

    /// Most recent step.
    #[must_use]
    pub fn latest(&self) -> Option<&PredictedStep> {
        self.steps.back()
    }

    /// Steps kept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step is kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps oldest first.
    pub fn steps(&self) -> impl Iterator<Item = &PredictedStep> {
        self.steps.iter()
    }

    /// Corrects the history against the server's transform for `tick`.
    ///
    /// # Arguments
    ///
    /// * `authoritative` - Server transform after `tick`
    /// * `tick` - Tick the server transform belongs to
    /// * `speed` - Player speed used for replay
    pub fn reconcile(&mut self, authoritative: Transform, tick: u32, speed: f32) -> Correction {
        while self.steps.front().is_some_and(|step| step.tick < tick) {
            self.steps.pop_front();
        }

        let Some(front) = self.steps.front_mut() else {
            return Correction::Snap {
                state: authoritative,
                replayed: 0,
            };
        };

        let error = front.state.distance(&authoritative);
        if error <= self.threshold {
            let state = self.steps.back().map_or(authoritative, |step| step.state);
            return Correction::Soft { state, error };
        }

        front.state = authoritative;
        tracing::debug!(
            "prediction off by {:.2} at tick {}, replaying {} steps",
            error,
            tick,
            self.steps.len() - 1
        );
        let mut state = authoritative;
        for step in self.steps.iter_mut().skip(1) {
            state = step_player(&state, step.input, speed, step.dt);
            step.state = state;
        }
        Correction::Snap {
            state,
            replayed: self.steps.len() - 1,
        }
    }
}
