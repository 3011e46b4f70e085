//! # Resource Memory
//!
//! Generation-checked storage for assets referenced by components.
//!
//! - `SlotMap`: O(1) insert/remove with handles that go stale on removal
//! - `ResourceManager`: name-keyed cache over a slot map, the bridge between
//!   in-process handles and the resource names that travel on the wire

mod resources;
mod slot_map;

pub use resources::{AssetCatalog, NoAssets, ResourceManager};
pub use slot_map::{ResourceHandle, SlotMap};
