use std::any::Any;

use glam::Vec2;

use super::camera::Camera;
use super::entity::{EntityId, SceneGraph};
use super::images::ImageStore;
use super::input::InputSystem;
use super::rendering::Viewport;

/// Coordinate space a scene's root is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneSpace {
    /// Drawn through the camera; pointer is in world units.
    World,
    /// Drawn in screen pixels; pointer is in screen pixels.
    Screen,
}

/// Everything a scene behavior may touch during one call.
pub struct SceneContext<'a> {
    pub dt_seconds: f32,
    pub elapsed_seconds: f64,
    pub space: SceneSpace,
    pub graph: &'a mut SceneGraph,
    pub input: &'a mut InputSystem,
    pub camera: &'a mut Camera,
    pub images: &'a mut ImageStore,
    pub viewport: Viewport,
    /// Entity of this scene whose pointer target won this tick's hit test.
    pub hovered: Option<EntityId>,
}

impl SceneContext<'_> {
    /// Pointer position in this scene's space.
    pub fn pointer(&self) -> Option<Vec2> {
        match self.space {
            SceneSpace::World => self.input.pointer_world(),
            SceneSpace::Screen => self.input.pointer_screen(),
        }
    }

    pub fn request_render(&mut self) {
        self.graph.request_render();
    }
}

/// Scene-level behavior driving one scene graph.
pub trait Scene: Any {
    fn load(&mut self, _ctx: &mut SceneContext<'_>) {}

    /// Returns true when something visible changed.
    fn update(&mut self, ctx: &mut SceneContext<'_>) -> bool;

    fn unload(&mut self, _ctx: &mut SceneContext<'_>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct SceneRuntime {
    pub(crate) name: String,
    pub(crate) space: SceneSpace,
    pub(crate) graph: SceneGraph,
    pub(crate) behavior: Option<Box<dyn Scene>>,
    pub(crate) is_loaded: bool,
    pub(crate) hovered: Option<EntityId>,
}

impl SceneRuntime {
    pub(crate) fn new(name: &str, space: SceneSpace) -> Self {
        Self {
            name: name.to_string(),
            space,
            graph: SceneGraph::new(format!("{name}_root")),
            behavior: None,
            is_loaded: false,
            hovered: None,
        }
    }

    pub(crate) fn pointer(&self, input: &InputSystem) -> Option<Vec2> {
        match self.space {
            SceneSpace::World => input.pointer_world(),
            SceneSpace::Screen => input.pointer_screen(),
        }
    }
}
