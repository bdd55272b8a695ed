use std::collections::HashSet;

use engine::{EngineError, SceneGraph};
use glam::Vec2;
use tracing::debug;

use super::history::TransactionHash;
use super::level_editor::{LevelEditor, PlaceRequest, RemoveQuery};
use super::settings::Tool;
use super::tiles::PositionKey;
use crate::level::{Position, Slot, Tid};

/// Pointer travel, in world units, before a select press turns into a drag.
pub const DEFAULT_DRAG_THRESHOLD: f32 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Idle,
    /// Brush stroke; each slot is painted at most once.
    Painting {
        hash: TransactionHash,
        visited: HashSet<PositionKey>,
    },
    Erasing {
        hash: TransactionHash,
        visited: HashSet<PositionKey>,
    },
    /// Select tool pressed, not yet a click or a drag.
    Pressing {
        start: Vec2,
        tid: Option<Tid>,
        extend: bool,
    },
    /// Selection being dragged; only visuals move until release.
    Moving {
        start_cell: Position,
        offset: (i32, i32),
        tids: Vec<Tid>,
    },
    BoxSelecting {
        start: Vec2,
        current: Vec2,
        extend: bool,
    },
}

/// Turns press/drag/release of the primary button into editor operations.
#[derive(Debug)]
pub struct GestureController {
    gesture: Gesture,
    drag_threshold: f32,
}

impl Default for GestureController {
    fn default() -> Self {
        Self {
            gesture: Gesture::Idle,
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
        }
    }
}

impl GestureController {
    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn set_drag_threshold(&mut self, threshold: f32) {
        self.drag_threshold = threshold.max(0.0);
    }

    /// Corners of the box being dragged out, if any.
    pub fn selection_box(&self) -> Option<(Vec2, Vec2)> {
        match self.gesture {
            Gesture::BoxSelecting { start, current, .. } => Some((start, current)),
            _ => None,
        }
    }

    /// Slot the current brush would paint under `world`.
    pub fn brush_slot_at(editor: &LevelEditor, world: Vec2) -> Slot {
        LevelEditor::slot_at(editor.settings().brush().entity_type, world)
    }

    pub fn press(
        &mut self,
        editor: &mut LevelEditor,
        graph: &mut SceneGraph,
        world: Vec2,
        extend: bool,
    ) -> Result<(), EngineError> {
        self.gesture = match editor.settings().tool() {
            Tool::Brush => Gesture::Painting {
                hash: editor.begin_transaction(),
                visited: HashSet::new(),
            },
            Tool::Eraser => Gesture::Erasing {
                hash: editor.begin_transaction(),
                visited: HashSet::new(),
            },
            Tool::Select => Gesture::Pressing {
                start: world,
                tid: editor.pick(graph, world),
                extend,
            },
        };
        editor.settings_mut().set_dragging(true);
        self.stroke(editor, graph, world)
    }

    pub fn drag(
        &mut self,
        editor: &mut LevelEditor,
        graph: &mut SceneGraph,
        world: Vec2,
    ) -> Result<(), EngineError> {
        match &mut self.gesture {
            Gesture::Idle => Ok(()),
            Gesture::Painting { .. } | Gesture::Erasing { .. } => self.stroke(editor, graph, world),
            Gesture::Pressing { start, tid, extend } => {
                if start.distance(world) < self.drag_threshold {
                    return Ok(());
                }
                let (start, tid, extend) = (*start, *tid, *extend);
                self.gesture = match tid {
                    Some(tid) => {
                        if !editor.selection().contains(&tid) {
                            if extend {
                                editor.toggle_selected(tid);
                            } else {
                                editor.select([tid]);
                            }
                        }
                        editor.settings_mut().set_moving(true);
                        Gesture::Moving {
                            start_cell: Position::containing(start),
                            offset: (0, 0),
                            tids: editor.selection().into_iter().collect(),
                        }
                    }
                    None => Gesture::BoxSelecting {
                        start,
                        current: world,
                        extend,
                    },
                };
                self.drag(editor, graph, world)
            }
            Gesture::Moving {
                start_cell,
                offset,
                tids,
            } => {
                let cell = Position::containing(world);
                let next = (cell.x - start_cell.x, cell.y - start_cell.y);
                if next != *offset {
                    *offset = next;
                    editor.preview_offset(graph, tids, Vec2::new(next.0 as f32, next.1 as f32));
                }
                Ok(())
            }
            Gesture::BoxSelecting { current, .. } => {
                *current = world;
                Ok(())
            }
        }
    }

    pub fn release(
        &mut self,
        editor: &mut LevelEditor,
        graph: &mut SceneGraph,
        world: Vec2,
    ) -> Result<(), EngineError> {
        self.drag(editor, graph, world)?;
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        editor.settings_mut().set_dragging(false);
        match gesture {
            Gesture::Idle | Gesture::Painting { .. } | Gesture::Erasing { .. } => {}
            Gesture::Pressing { tid, extend, .. } => match (tid, extend) {
                (Some(tid), true) => {
                    editor.toggle_selected(tid);
                }
                (Some(tid), false) => {
                    editor.select([tid]);
                }
                (None, false) => editor.clear_selection(),
                (None, true) => {}
            },
            Gesture::Moving { offset, tids, .. } => {
                editor.settings_mut().set_moving(false);
                editor.move_entities(graph, &tids, offset.0, offset.1, None)?;
                editor.restore_visuals(graph, &tids);
            }
            Gesture::BoxSelecting {
                start,
                current,
                extend,
            } => {
                let selected = editor.select_in_box(start, current, extend);
                debug!(count = selected.len(), "box_selected");
            }
        }
        Ok(())
    }

    /// Escape: abandons a move or box selection, or clears the selection when idle.
    pub fn cancel(&mut self, editor: &mut LevelEditor, graph: &mut SceneGraph) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        editor.settings_mut().set_dragging(false);
        match gesture {
            Gesture::Idle => editor.clear_selection(),
            Gesture::Moving { tids, .. } => {
                editor.settings_mut().set_moving(false);
                editor.restore_visuals(graph, &tids);
                debug!(count = tids.len(), "move_cancelled");
            }
            Gesture::Painting { .. }
            | Gesture::Erasing { .. }
            | Gesture::Pressing { .. }
            | Gesture::BoxSelecting { .. } => {}
        }
    }

    fn stroke(
        &mut self,
        editor: &mut LevelEditor,
        graph: &mut SceneGraph,
        world: Vec2,
    ) -> Result<(), EngineError> {
        let brush = editor.settings().brush();
        let slot = LevelEditor::slot_at(brush.entity_type, world);
        match &mut self.gesture {
            Gesture::Painting { hash, visited } => {
                if visited.insert(PositionKey::at(slot, brush.entity_type)) {
                    editor.place_tile(graph, PlaceRequest::from_brush(brush, slot), Some(*hash))?;
                }
            }
            Gesture::Erasing { hash, visited } => {
                if visited.insert(PositionKey::at(slot, brush.entity_type)) {
                    editor.remove_entities(
                        graph,
                        &[RemoveQuery::at(brush.entity_type, slot)],
                        Some(*hash),
                    )?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
