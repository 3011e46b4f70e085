//! # Entity Component System
//!
//! A sparse-set ECS with per-component change tracking.
//!
//! ## Design Philosophy
//!
//! - Entities are 32-bit ids: slot index plus generation counter
//! - Each component type lives in its own dense store
//! - Stores are type-erased behind [`ErasedStore`] so the registry and the
//!   replication layer can sweep them without knowing concrete types
//! - Writes mark entities dirty; only the replication drain clears them

mod component;
mod entity;
mod identity;
mod registry;
mod storage;

pub use component::{Component, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use identity::NetworkIdentity;
pub use registry::{DestroyedEntity, Registry, ScopeComponent};
pub use storage::{ComponentStore, ErasedStore};
