//! # Core Error Types
//!
//! All errors that can occur while touching the entity/component store.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// The entity does not carry the requested component.
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Name of the missing component type.
        component: &'static str,
    },

    /// The entity was destroyed or never allocated.
    #[error("entity {0} is not alive")]
    DeadEntity(Entity),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
