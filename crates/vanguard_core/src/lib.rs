//! # VANGUARD Core Engine
//!
//! Sparse-set Entity Component System built for network replication:
//! - O(1) insert, remove and membership test per component type
//! - Per-entity dirty flags drained by the replication layer
//! - Generation-checked handles for entities and resources
//!
//! ## Architecture Rules
//!
//! 1. **Dense storage** - live components are packed contiguously
//! 2. **Change tracking** - every write marks the entity dirty for its type
//! 3. **No panics on bad input** - stale ids and missing components are errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use vanguard_core::{Registry, NetworkIdentity};
//!
//! let mut registry = Registry::new();
//! let entity = registry.create();
//! registry.add(entity, NetworkIdentity::new(0xFEED, 0))?;
//! let changed = registry.store_mut::<NetworkIdentity>().drain_dirty();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod error;
pub mod hash;
pub mod memory;
pub mod wire;

pub use ecs::{
    Component, ComponentStore, ComponentTypeId, DestroyedEntity, Entity, EntityAllocator,
    ErasedStore, NetworkIdentity, Registry, ScopeComponent,
};
pub use error::{EcsError, EcsResult};
pub use hash::fnv1a_32;
pub use memory::{AssetCatalog, NoAssets, ResourceHandle, ResourceManager, SlotMap};
pub use wire::{Replicated, WireReader, WireWriter};
