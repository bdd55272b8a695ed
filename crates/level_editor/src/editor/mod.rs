mod gestures;
mod grid;
mod history;
mod level_editor;
mod overlap;
mod rotation;
mod scene;
mod settings;
mod tiles;
mod visual;

#[cfg(test)]
mod tests;

pub use gestures::{Gesture, GestureController, DEFAULT_DRAG_THRESHOLD};
pub use grid::{visible_cells, GridBackground, MAJOR_LINE_EVERY};
pub use history::{EditAction, EditGroup, EditKind, History, TransactionHash};
pub use level_editor::{LevelEditor, LevelListener, PlaceRequest, RemoveQuery};
pub use overlap::{conflicts, find_conflicts, CriticalCells};
pub use rotation::{flip_one_way, pivot_cell, rotate_entity, Turn};
pub use scene::{EditorScene, EDITOR_SCENE};
pub use settings::{Brush, CameraRequest, EditorSettings, InMemorySettings, Selection, Tool};
pub use tiles::{PositionKey, SlotKind, Tile, TileGrid, TileHandle, STASH_CAPACITY};
pub use visual::{
    hit_bounds, palette, tile_bounds, BrushPreview, Palette, SelectionBox, TileVariant, TileVisual,
};
