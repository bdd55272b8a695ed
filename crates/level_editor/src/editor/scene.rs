use std::any::Any;

use engine::{
    CameraTarget, EngineError, Entity as Node, EntityId, Key, PointerButton, Scene, SceneContext,
    SceneGraph,
};
use glam::Vec2;
use tracing::{error, info};

use super::gestures::GestureController;
use super::grid::GridBackground;
use super::level_editor::{LevelEditor, PlaceRequest};
use super::rotation::Turn;
use super::settings::Tool;
use super::visual::{BrushPreview, SelectionBox};
use crate::level::Tid;

/// Name of the world scene the editor lives in.
pub const EDITOR_SCENE: &str = "editor";

const GRID_Z_INDEX: i32 = -1;
const OVERLAY_Z_INDEX: i32 = 1;

/// Scene behavior wiring engine input into the level editor.
pub struct EditorScene {
    editor: LevelEditor,
    gestures: GestureController,
    grid: EntityId,
    preview: EntityId,
    selection_box: EntityId,
    seen_palette_version: u64,
    last_pointer: Option<Vec2>,
}

impl EditorScene {
    /// Adds the grid and overlay entities next to the editor's tile layer.
    pub fn new(graph: &mut SceneGraph, editor: LevelEditor) -> Result<Self, EngineError> {
        let root = graph.root();
        let palette = editor.document().color_palette;
        let grid = graph.add_child(
            root,
            Node::new("grid")
                .with_z_index(GRID_Z_INDEX)
                .with_component(GridBackground::new(palette)),
        )?;
        let preview = graph.add_child(
            root,
            Node::new("brush_preview")
                .with_z_index(OVERLAY_Z_INDEX)
                .with_component(BrushPreview::default()),
        )?;
        let selection_box = graph.add_child(
            root,
            Node::new("selection_box")
                .with_z_index(OVERLAY_Z_INDEX)
                .with_component(SelectionBox::default()),
        )?;
        Ok(Self {
            seen_palette_version: editor.palette_version().wrapping_sub(1),
            editor,
            gestures: GestureController::default(),
            grid,
            preview,
            selection_box,
            last_pointer: None,
        })
    }

    pub fn editor(&self) -> &LevelEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut LevelEditor {
        &mut self.editor
    }

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    fn handle_input(&mut self, ctx: &mut SceneContext<'_>) -> Result<bool, EngineError> {
        let keys = self.handle_keys(ctx)?;
        let pointer = self.handle_pointer(ctx)?;
        Ok(keys || pointer)
    }

    fn handle_keys(&mut self, ctx: &mut SceneContext<'_>) -> Result<bool, EngineError> {
        let input = &*ctx.input;
        let command = input.command_down();
        let shift = input.shift_down();
        let selection: Vec<Tid> = self.editor.selection().into_iter().collect();
        let mut handled = true;

        if command && input.key_pressed(Key::Char('z')) {
            if shift {
                self.editor.redo(ctx.graph)?;
            } else {
                self.editor.undo(ctx.graph)?;
            }
        } else if command && input.key_pressed(Key::Char('y')) {
            self.editor.redo(ctx.graph)?;
        } else if input.key_pressed(Key::Delete) || input.key_pressed(Key::Backspace) {
            self.editor.remove_tiles(ctx.graph, &selection, None)?;
        } else if !command && input.key_pressed(Key::Char('r')) {
            let turn = if shift {
                Turn::Clockwise
            } else {
                Turn::CounterClockwise
            };
            self.editor.rotate_entities(ctx.graph, &selection, turn, None)?;
        } else if !command && input.key_pressed(Key::Char('f')) {
            self.editor.flip_one_ways(ctx.graph, &selection, None)?;
        } else if !command && input.key_pressed(Key::Char('b')) {
            let brush = self.editor.settings().brush().cycled(!shift);
            self.editor.settings_mut().set_brush(brush);
            info!(entity_type = ?brush.entity_type, "brush_changed");
        } else if let Some(tool) = [('1', Tool::Brush), ('2', Tool::Eraser), ('3', Tool::Select)]
            .into_iter()
            .find(|(key, _)| input.key_pressed(Key::Char(*key)))
            .map(|(_, tool)| tool)
        {
            self.editor.settings_mut().set_tool(tool);
        } else {
            handled = false;
        }

        if ctx.input.key_pressed(Key::Escape) {
            self.gestures.cancel(&mut self.editor, ctx.graph);
            handled = true;
        }
        Ok(handled)
    }

    fn handle_pointer(&mut self, ctx: &mut SceneContext<'_>) -> Result<bool, EngineError> {
        if let Some(pointer) = ctx.pointer() {
            self.last_pointer = Some(pointer);
        }
        let Some(world) = self.last_pointer else {
            return Ok(false);
        };
        let left = ctx.input.button(PointerButton::Left);
        if left.pressed() {
            let extend = ctx.input.shift_down();
            self.gestures.press(&mut self.editor, ctx.graph, world, extend)?;
        } else if left.down() {
            self.gestures.drag(&mut self.editor, ctx.graph, world)?;
        }
        if left.released() {
            self.gestures.release(&mut self.editor, ctx.graph, world)?;
        }
        Ok(left.pressed() || left.released() || !self.gestures.is_idle())
    }

    fn sync_palette(&mut self, graph: &mut SceneGraph) -> bool {
        if self.editor.palette_version() == self.seen_palette_version {
            return false;
        }
        self.seen_palette_version = self.editor.palette_version();
        let palette = self.editor.document().color_palette;
        if let Some(grid) = graph.component_mut::<GridBackground>(self.grid) {
            grid.set_palette(palette);
        }
        if let Some(preview) = graph.component_mut::<BrushPreview>(self.preview) {
            preview.set_palette(palette);
        }
        if let Some(selection_box) = graph.component_mut::<SelectionBox>(self.selection_box) {
            selection_box.set_palette(palette);
        }
        true
    }

    fn update_overlays(&mut self, ctx: &mut SceneContext<'_>) -> bool {
        let settings = self.editor.settings();
        let painting = settings.tool() == Tool::Brush && !settings.is_moving();
        let preview = match (painting, ctx.pointer()) {
            (true, Some(world)) => {
                let slot = GestureController::brush_slot_at(&self.editor, world);
                let entity = PlaceRequest::from_brush(settings.brush(), slot).entity();
                Some((entity, self.editor.placement_allowed(&entity)))
            }
            _ => None,
        };
        let mut changed = false;
        if let Some(component) = ctx.graph.component_mut::<BrushPreview>(self.preview) {
            changed |= component.set_preview(preview);
        }
        if let Some(component) = ctx.graph.component_mut::<SelectionBox>(self.selection_box) {
            changed |= component.set_corners(self.gestures.selection_box());
        }
        changed
    }
}

impl Scene for EditorScene {
    fn load(&mut self, ctx: &mut SceneContext<'_>) {
        let entrance = self.editor.document().entrance().entity.slot().world_center();
        ctx.camera.set_position(entrance);
        self.editor.sync_highlights(ctx.graph, None, true);
        self.sync_palette(ctx.graph);
        info!(
            entities = self.editor.entity_count(),
            palette = self.editor.document().color_palette,
            "editor_scene_loaded"
        );
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>) -> bool {
        let world_per_px = 1.0 / (ctx.camera.pixels_per_unit() * ctx.camera.zoom()).max(1e-3);
        self.gestures
            .set_drag_threshold(ctx.input.click_distance_px() * world_per_px);

        let mut changed = match self.handle_input(ctx) {
            Ok(changed) => changed,
            Err(err) => {
                error!(error = %err, "editor_update_failed");
                true
            }
        };

        let hovered = ctx
            .hovered
            .and_then(|visual| self.editor.tiles().tid_for_visual(visual));
        self.editor.sync_highlights(ctx.graph, hovered, false);
        changed |= self.sync_palette(ctx.graph);

        if let Some(request) = self.editor.settings_mut().take_camera_request() {
            ctx.camera.fly_to(CameraTarget {
                position: Some(Vec2::new(request.x, request.y)),
                zoom: request.zoom,
                ..CameraTarget::default()
            });
            changed = true;
        }
        changed | self.update_overlays(ctx)
    }

    fn unload(&mut self, _ctx: &mut SceneContext<'_>) {
        info!(entities = self.editor.entity_count(), "editor_scene_unloaded");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
