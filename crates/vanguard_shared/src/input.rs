//! Player input snapshots.

use bytemuck::{Pod, Zeroable};

/// Discrete player actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Move towards negative Y.
    MoveUp = 0,
    /// Move towards positive Y.
    MoveDown = 1,
    /// Move towards negative X.
    MoveLeft = 2,
    /// Move towards positive X.
    MoveRight = 3,
    /// Fire the primary weapon.
    Shoot = 4,
}

impl Action {
    /// Every action, in bit order.
    pub const ALL: [Self; 5] = [
        Self::MoveUp,
        Self::MoveDown,
        Self::MoveLeft,
        Self::MoveRight,
        Self::Shoot,
    ];

    #[inline]
    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Actions held during one tick, packed as a bitset.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct InputSnapshot {
    /// One bit per [`Action`].
    pub actions: u32,
}

impl InputSnapshot {
    /// No action held.
    pub const NONE: Self = Self { actions: 0 };

    /// Returns a copy with `action` held.
    #[inline]
    #[must_use]
    pub const fn with(self, action: Action) -> Self {
        Self {
            actions: self.actions | action.bit(),
        }
    }

    /// Marks `action` as held.
    #[inline]
    pub fn press(&mut self, action: Action) {
        self.actions |= action.bit();
    }

    /// Checks whether `action` is held.
    #[inline]
    #[must_use]
    pub const fn is_pressed(self, action: Action) -> bool {
        self.actions & action.bit() != 0
    }

    /// Horizontal axis in `[-1, 1]`.
    #[must_use]
    pub fn horizontal(self) -> f32 {
        axis(self.is_pressed(Action::MoveLeft), self.is_pressed(Action::MoveRight))
    }

    /// Vertical axis in `[-1, 1]`.
    #[must_use]
    pub fn vertical(self) -> f32 {
        axis(self.is_pressed(Action::MoveUp), self.is_pressed(Action::MoveDown))
    }
}

fn axis(negative: bool, positive: bool) -> f32 {
    match (negative, positive) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    }
}
