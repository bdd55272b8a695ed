use std::any::Any;

use glam::Vec2;

use super::camera::Camera;
use super::entity::{EntityId, SceneGraph};
use super::rendering::{RenderQueue, Viewport};

/// Per-tick values shared by every component update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub dt_seconds: f32,
    pub elapsed_seconds: f64,
    /// Pointer in the coordinate space of the scene being updated.
    pub pointer: Option<Vec2>,
    pub camera_zoom: f32,
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self {
            dt_seconds: 0.0,
            elapsed_seconds: 0.0,
            pointer: None,
            camera_zoom: 1.0,
        }
    }
}

pub struct UpdateContext<'a> {
    pub entity: EntityId,
    pub graph: &'a mut SceneGraph,
    pub frame: FrameInfo,
}

pub struct RenderContext<'a> {
    pub entity: EntityId,
    pub graph: &'a SceneGraph,
    pub camera: &'a Camera,
    pub viewport: Viewport,
}

/// A behavior unit attached to an entity.
///
/// While a component runs, its own slot is vacated, so it may freely look up
/// sibling components or mutate the graph through `ctx.graph`.
pub trait Component: Any {
    /// Returns true when something visible changed this tick.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> bool {
        false
    }

    /// Emits draw commands in the owning entity's local space.
    fn queue_render_commands(&self, _ctx: &RenderContext<'_>, _queue: &mut RenderQueue) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u64);

pub(crate) struct ComponentSlot {
    pub(crate) id: ComponentId,
    pub(crate) z_index: i32,
    pub(crate) enabled: bool,
    pub(crate) component: Option<Box<dyn Component>>,
}

impl ComponentSlot {
    pub(crate) fn sort_key(&self) -> (i32, u64) {
        (self.z_index, self.id.0)
    }

    pub(crate) fn is<T: Component>(&self) -> bool {
        self.component
            .as_deref()
            .is_some_and(|component| component.as_any().is::<T>())
    }
}
