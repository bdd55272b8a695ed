use std::any::Any;

use glam::Vec2;

use super::component::Component;
use super::entity::{EntityId, SceneGraph};
use super::rendering::Rect;

/// Hit-test rectangle in the owning entity's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerTarget {
    pub rect: Rect,
    hovered: bool,
}

impl PointerTarget {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            hovered: false,
        }
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }
}

impl Component for PointerTarget {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoverOutcome {
    pub target: Option<EntityId>,
    pub changed: bool,
}

/// Topmost enabled target containing `pointer` (in the graph's root space).
pub fn hit_test(graph: &SceneGraph, pointer: Vec2) -> Option<EntityId> {
    graph.render_order().into_iter().rev().find(|&id| {
        graph.enabled_component::<PointerTarget>(id).is_some_and(|target| {
            let local = graph.world_matrix(id).inverse().transform_point2(pointer);
            target.rect.contains(local)
        })
    })
}

/// Sets `hovered` on the single winning target and clears it everywhere else.
/// A `None` pointer clears every target.
pub fn update_hover(graph: &mut SceneGraph, pointer: Option<Vec2>) -> HoverOutcome {
    let target = pointer.and_then(|pointer| hit_test(graph, pointer));
    let mut changed = false;
    for id in graph.render_order() {
        if let Some(component) = graph.component_mut::<PointerTarget>(id) {
            let hovered = Some(id) == target;
            changed |= component.hovered != hovered;
            component.hovered = hovered;
        }
    }
    HoverOutcome { target, changed }
}
