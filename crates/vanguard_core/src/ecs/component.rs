//! # Component System
//!
//! Components are pure data containers with no behavior. Each type carries a
//! stable name; its wire id is the FNV-1a hash of that name.

use std::fmt;

use crate::hash::fnv1a_32;

/// Stable numeric id of a component type on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ComponentTypeId(pub u32);

impl ComponentTypeId {
    /// Derives the id from a component name.
    #[inline]
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(fnv1a_32(name.as_bytes()))
    }

    /// Returns the id of component type `C`.
    #[inline]
    #[must_use]
    pub const fn of<C: Component>() -> Self {
        C::TYPE_ID
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Marker trait for ECS components.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Velocity {
///     vx: f32,
///     vy: f32,
/// }
///
/// impl Component for Velocity {
///     const NAME: &'static str = "Velocity";
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Stable name. Renaming a component changes its wire id.
    const NAME: &'static str;

    /// Wire id derived from [`Component::NAME`].
    const TYPE_ID: ComponentTypeId = ComponentTypeId::from_name(Self::NAME);
}
