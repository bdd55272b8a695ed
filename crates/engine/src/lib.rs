use thiserror::Error;

pub mod app;

pub use app::*;
pub use glam::{Affine2, Vec2};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("scene `{0}` does not exist")]
    MissingScene(String),
    #[error("scene `{0}` already exists")]
    DuplicateScene(String),
    #[error("entity {0:?} does not exist in this scene")]
    MissingEntity(EntityId),
    #[error("entity {entity:?} has no component of type {type_name}")]
    MissingComponent {
        entity: EntityId,
        type_name: &'static str,
    },
    #[error("scene `{scene}` has no behavior of type {expected}")]
    SceneTypeMismatch {
        scene: String,
        expected: &'static str,
    },
}
