use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::level::{EntityType, Layer, Rotation, Tid};

pub type Selection = BTreeSet<Tid>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Select,
}

/// What the brush paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brush {
    pub entity_type: EntityType,
    pub rotation: Rotation,
    pub flip_direction: bool,
    pub channel: i32,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            entity_type: EntityType::Wall,
            rotation: Rotation::Right,
            flip_direction: false,
            channel: 0,
        }
    }
}

impl Brush {
    /// Same brush painting the next (or previous) entity type, wrapping around.
    pub fn cycled(self, forward: bool) -> Self {
        let types = EntityType::ALL;
        let index = types
            .iter()
            .position(|entity_type| *entity_type == self.entity_type)
            .unwrap_or(0);
        let step = if forward { 1 } else { types.len() - 1 };
        Self {
            entity_type: types[(index + step) % types.len()],
            ..self
        }
    }
}

/// Where the camera should fly next, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRequest {
    pub x: f32,
    pub y: f32,
    pub zoom: Option<f32>,
}

/// Editor state that outlives a session, owned by an external store.
pub trait EditorSettings {
    fn tool(&self) -> Tool;
    fn set_tool(&mut self, tool: Tool);

    fn brush(&self) -> Brush;
    fn set_brush(&mut self, brush: Brush);

    fn selection(&self) -> &Selection;
    fn set_selection(&mut self, selection: Selection);

    fn is_layer_locked(&self, layer: Layer) -> bool;
    fn set_layer_locked(&mut self, layer: Layer, locked: bool);

    fn request_camera(&mut self, request: CameraRequest);
    fn take_camera_request(&mut self) -> Option<CameraRequest>;

    fn is_dragging(&self) -> bool;
    fn set_dragging(&mut self, dragging: bool);

    fn is_moving(&self) -> bool;
    fn set_moving(&mut self, moving: bool);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InMemorySettings {
    tool: Tool,
    brush: Brush,
    selection: Selection,
    locked_layers: BTreeSet<Layer>,
    camera_request: Option<CameraRequest>,
    dragging: bool,
    moving: bool,
}

impl EditorSettings for InMemorySettings {
    fn tool(&self) -> Tool {
        self.tool
    }

    fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    fn brush(&self) -> Brush {
        self.brush
    }

    fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    fn selection(&self) -> &Selection {
        &self.selection
    }

    fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    fn is_layer_locked(&self, layer: Layer) -> bool {
        self.locked_layers.contains(&layer)
    }

    fn set_layer_locked(&mut self, layer: Layer, locked: bool) {
        if locked {
            self.locked_layers.insert(layer);
        } else {
            self.locked_layers.remove(&layer);
        }
    }

    fn request_camera(&mut self, request: CameraRequest) {
        self.camera_request = Some(request);
    }

    fn take_camera_request(&mut self) -> Option<CameraRequest> {
        self.camera_request.take()
    }

    fn is_dragging(&self) -> bool {
        self.dragging
    }

    fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    fn is_moving(&self) -> bool {
        self.moving
    }

    fn set_moving(&mut self, moving: bool) {
        self.moving = moving;
    }
}
