use std::cell::Cell;
use std::rc::Rc;

use engine::{
    Engine, EngineConfig, Key, PointerButton, RawInput, RecordingSurface, SceneGraph, SceneSpace,
};
use glam::Vec2;
use serde_json::json;

use super::*;
use crate::level::{
    metadata, CellEntity, EdgeAlignment, EdgeEntity, EdgePosition, Entity, EntityType, Explosion,
    Layer, LevelFile, Position, PositionType, Rotation, Slot, Tid, MAX_ENTITY_COUNT,
    MAX_WAVEFRONT_STEPS,
};

struct Harness {
    graph: SceneGraph,
    editor: LevelEditor,
}

impl Harness {
    fn new(level: &LevelFile) -> Self {
        let mut graph = SceneGraph::new("editor");
        let editor = LevelEditor::new(
            &mut graph,
            level,
            Box::new(InMemorySettings::default()),
            false,
        )
        .expect("editor");
        Self { graph, editor }
    }

    fn empty() -> Self {
        Self::new(&LevelFile::default())
    }

    fn place(&mut self, entity_type: EntityType, slot: Slot) -> Selection {
        self.editor
            .place_tile(&mut self.graph, PlaceRequest::new(entity_type, slot), None)
            .expect("place")
    }

    fn place_cell(&mut self, entity_type: EntityType, x: i32, y: i32) -> Tid {
        let selection = self.place(entity_type, Slot::Cell(Position::new(x, y)));
        single(&selection)
    }

    fn file(&self) -> LevelFile {
        self.editor.document().to_file()
    }
}

fn single(selection: &Selection) -> Tid {
    assert_eq!(selection.len(), 1, "expected exactly one selected tile");
    *selection.iter().next().expect("one tid")
}

fn edge(x: i32, y: i32) -> Slot {
    Slot::Edge(EdgePosition::right(x, y))
}

#[test]
fn wall_curtain_and_second_wall_on_one_edge() {
    let mut h = Harness::empty();
    let wall = single(&h.place(EntityType::Wall, edge(3, 4)));

    let entities = h.file().entities;
    assert_eq!(entities.len(), 1);
    assert_eq!(
        serde_json::to_value(&entities[0]).expect("encode"),
        json!({
            "entityType": "WALL",
            "edgePosition": { "cell": { "x": 3, "y": 4 }, "alignment": "RIGHT" }
        })
    );

    let curtain = single(&h.place(EntityType::Curtain, edge(3, 4)));
    assert_ne!(curtain, wall);
    assert_eq!(h.editor.entity_count(), 4);

    let again = h.place(EntityType::Wall, edge(3, 4));
    assert_eq!(single(&again), wall);
    assert_eq!(h.editor.entity_count(), 4);
    assert_eq!(h.editor.document().count_of(EntityType::Wall), 1);
    assert_eq!(h.editor.tiles().at_slot(edge(3, 4)).count(), 2);
}

#[test]
fn repeated_placement_never_duplicates() {
    let mut h = Harness::empty();
    let first = h.place_cell(EntityType::Staff, 2, 2);
    let second = h.place_cell(EntityType::Staff, 2, 2);
    assert_eq!(first, second);
    assert_eq!(h.editor.document().count_of(EntityType::Staff), 1);
    assert!(h.editor.can_undo());

    let button = PlaceRequest::new(EntityType::Button, Slot::Cell(Position::new(6, 6)));
    h.editor.place_tile(&mut h.graph, button, None).expect("button");
    let rewired = PlaceRequest { channel: 2, ..button };
    h.editor.place_tile(&mut h.graph, rewired, None).expect("rewire");
    assert_eq!(h.editor.document().count_of(EntityType::Button), 1);
    let button = h
        .editor
        .document()
        .iter()
        .find(|item| item.entity.entity_type() == EntityType::Button)
        .expect("button");
    assert_eq!(button.entity.channel(), Some(2));
}

#[test]
fn undo_and_redo_round_trip_a_sequence_of_edits() {
    let mut h = Harness::empty();
    let before = h.file();

    let wall = single(&h.place(EntityType::Wall, edge(1, 1)));
    let staff = h.place_cell(EntityType::Staff, 2, 2);
    h.editor
        .move_entities(&mut h.graph, &[staff], 3, 1, None)
        .expect("move");
    h.editor
        .rotate_entities(&mut h.graph, &[wall], Turn::CounterClockwise, None)
        .expect("rotate");
    // The rotated wall sits on top(2, 0); glass there displaces it.
    h.place(EntityType::Glass, Slot::Edge(EdgePosition::top(2, 0)));
    assert!(!h.editor.document().contains(wall));
    let removed = h.editor.remove_tiles(&mut h.graph, &[staff], None).expect("remove");
    assert_eq!(removed, 1);
    let after = h.file();
    assert_ne!(after, before);

    let mut steps = 0;
    while h.editor.undo(&mut h.graph).expect("undo") {
        steps += 1;
    }
    assert_eq!(steps, 6);
    assert_eq!(h.file(), before);

    while h.editor.redo(&mut h.graph).expect("redo") {}
    assert_eq!(h.file(), after);
    assert!(!h.editor.can_redo());
}

#[test]
fn entity_cap_allows_one_more_then_rejects() {
    let mut level = LevelFile::default();
    let free = MAX_ENTITY_COUNT - 3;
    for i in 0..free as i32 {
        level.entities.push(Entity::Staff(CellEntity {
            position: Position::new(10 + i % 100, 10 + i / 100),
        }));
    }
    let mut h = Harness::new(&level);
    assert_eq!(h.editor.entity_count(), MAX_ENTITY_COUNT - 1);

    h.place_cell(EntityType::Sauce, -10, -10);
    assert_eq!(h.editor.entity_count(), MAX_ENTITY_COUNT);

    let before = h.file();
    let selection = h.place(EntityType::Sauce, Slot::Cell(Position::new(-11, -10)));
    assert_eq!(single(&selection), single(&h.editor.selection()));
    assert_eq!(h.editor.entity_count(), MAX_ENTITY_COUNT);
    assert_eq!(h.file(), before);

    // Replacing an existing entity keeps the count and is still allowed.
    h.place_cell(EntityType::Sauce, 10, 10);
    assert_eq!(h.editor.entity_count(), MAX_ENTITY_COUNT);
    assert_eq!(h.editor.document().count_of(EntityType::Sauce), 2);
}

#[test]
fn cell_entities_never_land_on_entrance_or_exit() {
    let mut h = Harness::empty();
    let before = h.file();
    let critical = [
        h.editor.document().entrance_position(),
        h.editor.document().exit_position(),
    ];
    let blocked = EntityType::ALL.into_iter().filter(|entity_type| {
        metadata(*entity_type).position_type == PositionType::Cell
            && !matches!(
                entity_type,
                EntityType::Explosion | EntityType::TimeMachine | EntityType::Exit
            )
    });
    for entity_type in blocked {
        for cell in critical {
            h.place(entity_type, Slot::Cell(cell));
            assert_eq!(h.file(), before, "{entity_type:?} landed on {cell}");
        }
    }
    assert!(!h.editor.can_undo());

    let explosion = h.place(EntityType::Explosion, Slot::Cell(critical[0]));
    assert_eq!(explosion.len(), 1);
    assert_eq!(h.editor.document().count_of(EntityType::Explosion), 1);
}

#[test]
fn box_select_picks_enclosed_tiles_and_escape_clears() {
    let mut h = Harness::empty();
    let inside: Selection = (10..15)
        .map(|x| h.place_cell(EntityType::Staff, x, 10))
        .collect();
    h.place_cell(EntityType::Staff, 30, 30);
    h.editor.clear_selection();
    let before = h.file();

    h.editor.settings_mut().set_tool(Tool::Select);
    let mut gestures = GestureController::default();
    gestures
        .press(&mut h.editor, &mut h.graph, Vec2::new(9.2, 9.2), false)
        .expect("press");
    gestures
        .drag(&mut h.editor, &mut h.graph, Vec2::new(12.0, 10.8))
        .expect("drag");
    assert!(gestures.selection_box().is_some());
    gestures
        .release(&mut h.editor, &mut h.graph, Vec2::new(15.2, 11.2))
        .expect("release");

    assert_eq!(h.editor.selection(), inside);
    assert!(gestures.is_idle());

    gestures.cancel(&mut h.editor, &mut h.graph);
    assert!(h.editor.selection().is_empty());
    assert_eq!(h.file(), before);
}

#[test]
fn removed_tile_is_stashed_and_reclaimed_on_undo() {
    let mut h = Harness::empty();
    let wall = single(&h.place(EntityType::Wall, edge(5, 5)));
    let visual = h.editor.tiles().by_tid(wall).expect("tile").visual;

    h.editor.remove_tiles(&mut h.graph, &[wall], None).expect("remove");
    assert!(h.editor.tiles().is_stashed(wall));
    assert!(!h.graph.is_enabled(visual));
    assert!(h.editor.selection().is_empty());

    h.editor.undo(&mut h.graph).expect("undo");
    let tile = h.editor.tiles().by_tid(wall).expect("reclaimed");
    assert_eq!(tile.visual, visual);
    assert!(h.graph.is_enabled(visual));
    assert_eq!(h.editor.selection(), Selection::from([wall]));
}

#[test]
fn displaced_entities_come_back_on_undo() {
    let mut h = Harness::empty();
    let wall = single(&h.place(EntityType::Wall, edge(2, 3)));
    let glass = single(&h.place(EntityType::Glass, edge(2, 3)));
    assert!(!h.editor.document().contains(wall));
    assert_eq!(h.editor.tiles().at_slot(edge(2, 3)).count(), 1);

    h.editor.undo(&mut h.graph).expect("undo");
    assert!(h.editor.document().contains(wall));
    assert!(!h.editor.document().contains(glass));

    h.editor.redo(&mut h.graph).expect("redo");
    assert!(!h.editor.document().contains(wall));
    assert!(h.editor.document().contains(glass));
}

#[test]
fn time_machine_brush_moves_the_entrance() {
    let mut h = Harness::empty();
    let entrance = h.editor.document().entrance().tid;
    let moved = h.place_cell(EntityType::TimeMachine, 7, 7);
    assert_eq!(moved, entrance);
    assert_eq!(h.editor.document().entrance_position(), Position::new(7, 7));
    assert_eq!(h.editor.entity_count(), 2);

    let exit = h.editor.document().exit_position();
    h.place(EntityType::TimeMachine, Slot::Cell(exit));
    assert_eq!(h.editor.document().entrance_position(), Position::new(7, 7));

    h.editor.undo(&mut h.graph).expect("undo");
    assert_eq!(h.editor.document().entrance_position(), Position::new(0, 0));
    assert_eq!(h.editor.document().entrance().tid, entrance);
}

#[test]
fn moves_check_the_destination_not_the_source() {
    let mut h = Harness::empty();
    let staff = h.place_cell(EntityType::Staff, 1, 0);
    let before = h.file();
    h.editor
        .move_entities(&mut h.graph, &[staff], -1, 0, None)
        .expect("move");
    assert_eq!(h.file(), before);

    let entrance = h.editor.document().entrance().tid;
    h.editor
        .move_entities(&mut h.graph, &[entrance], 1, 1, None)
        .expect("move entrance");
    assert_eq!(h.editor.document().entrance_position(), Position::new(1, 1));

    // The freed cell is no longer critical.
    h.editor
        .move_entities(&mut h.graph, &[staff], -1, 0, None)
        .expect("move");
    assert_eq!(
        h.editor.document().get(staff),
        Some(Entity::Staff(CellEntity {
            position: Position::new(0, 0)
        }))
    );

    let out = h.place_cell(EntityType::Sauce, 250, 250);
    let before = h.file();
    h.editor
        .move_entities(&mut h.graph, &[out, staff], 10, 0, None)
        .expect("move");
    assert_eq!(h.file(), before);
}

#[test]
fn brush_stroke_paints_each_cell_once_and_undoes_as_one() {
    let mut h = Harness::empty();
    h.editor.settings_mut().set_brush(Brush {
        entity_type: EntityType::Staff,
        ..Brush::default()
    });
    let mut gestures = GestureController::default();
    gestures
        .press(&mut h.editor, &mut h.graph, Vec2::new(20.5, 20.5), false)
        .expect("press");
    for x in [20.7, 21.2, 21.8, 22.4, 22.6] {
        gestures
            .drag(&mut h.editor, &mut h.graph, Vec2::new(x, 20.5))
            .expect("drag");
    }
    gestures
        .release(&mut h.editor, &mut h.graph, Vec2::new(22.6, 20.5))
        .expect("release");
    assert_eq!(h.editor.document().count_of(EntityType::Staff), 3);

    assert!(h.editor.undo(&mut h.graph).expect("undo"));
    assert_eq!(h.editor.document().count_of(EntityType::Staff), 0);
    assert!(!h.editor.can_undo());
}

#[test]
fn eraser_stroke_removes_displaced_entities() {
    let mut h = Harness::empty();
    h.place(EntityType::Wall, edge(20, 20));
    h.place(EntityType::Wall, edge(21, 20));
    h.place(EntityType::Curtain, edge(21, 20));
    h.editor.settings_mut().set_tool(Tool::Eraser);

    let mut gestures = GestureController::default();
    gestures
        .press(&mut h.editor, &mut h.graph, Vec2::new(21.0, 20.5), false)
        .expect("press");
    gestures
        .release(&mut h.editor, &mut h.graph, Vec2::new(22.0, 20.5))
        .expect("release");
    assert_eq!(h.editor.document().count_of(EntityType::Wall), 0);
    assert_eq!(h.editor.document().count_of(EntityType::Curtain), 1);

    h.editor.undo(&mut h.graph).expect("undo");
    assert_eq!(h.editor.document().count_of(EntityType::Wall), 2);
}

#[test]
fn dragging_a_selected_tile_moves_it_on_release() {
    let mut h = Harness::empty();
    let staff = h.place_cell(EntityType::Staff, 10, 10);
    h.editor.settings_mut().set_tool(Tool::Select);
    let mut gestures = GestureController::default();

    gestures
        .press(&mut h.editor, &mut h.graph, Vec2::new(10.5, 10.5), false)
        .expect("press");
    gestures
        .drag(&mut h.editor, &mut h.graph, Vec2::new(12.5, 11.5))
        .expect("drag");
    assert!(h.editor.settings().is_moving());
    let preview = h.editor.tiles().visual_mut(&mut h.graph, staff).expect("visual").target();
    assert_eq!(preview, Vec2::new(12.5, 11.5));
    assert_eq!(
        h.editor.document().get(staff).map(|entity| entity.slot()),
        Some(Slot::Cell(Position::new(10, 10)))
    );

    gestures
        .release(&mut h.editor, &mut h.graph, Vec2::new(12.5, 11.5))
        .expect("release");
    assert!(!h.editor.settings().is_moving());
    assert_eq!(
        h.editor.document().get(staff).map(|entity| entity.slot()),
        Some(Slot::Cell(Position::new(12, 11)))
    );
}

#[test]
fn escape_during_move_restores_visuals_and_document() {
    let mut h = Harness::empty();
    let staff = h.place_cell(EntityType::Staff, 10, 10);
    h.editor.settings_mut().set_tool(Tool::Select);
    let before = h.file();
    let mut gestures = GestureController::default();

    gestures
        .press(&mut h.editor, &mut h.graph, Vec2::new(10.5, 10.5), false)
        .expect("press");
    gestures
        .drag(&mut h.editor, &mut h.graph, Vec2::new(14.5, 10.5))
        .expect("drag");
    gestures.cancel(&mut h.editor, &mut h.graph);

    assert_eq!(h.file(), before);
    let target = h.editor.tiles().visual_mut(&mut h.graph, staff).expect("visual").target();
    assert_eq!(target, Vec2::new(10.5, 10.5));
    assert_eq!(h.editor.selection(), Selection::from([staff]));
}

#[test]
fn locked_layers_are_left_alone() {
    let mut h = Harness::empty();
    let wall = single(&h.place(EntityType::Wall, edge(1, 1)));
    h.editor.settings_mut().set_layer_locked(Layer::Edges, true);

    let before = h.file();
    h.place(EntityType::Wall, edge(2, 2));
    assert_eq!(h.editor.remove_tiles(&mut h.graph, &[wall], None).expect("remove"), 0);
    assert_eq!(h.file(), before);

    h.editor.settings_mut().set_layer_locked(Layer::Edges, false);
    assert_eq!(h.editor.remove_tiles(&mut h.graph, &[wall], None).expect("remove"), 1);
}

#[test]
fn listener_hears_commits_but_not_rejections() {
    let mut h = Harness::empty();
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    h.editor.set_listener(move |_| seen.set(seen.get() + 1));

    h.place_cell(EntityType::Staff, 3, 3);
    assert_eq!(calls.get(), 1);
    h.place(EntityType::Staff, Slot::Cell(Position::new(0, 0)));
    assert_eq!(calls.get(), 1);
    h.editor.undo(&mut h.graph).expect("undo");
    assert_eq!(calls.get(), 2);
    assert!(h.editor.set_color_palette(&mut h.graph, 3));
    assert_eq!(calls.get(), 3);
    assert!(!h.editor.set_color_palette(&mut h.graph, 9));
    assert_eq!(calls.get(), 3);
}

#[test]
fn loading_a_level_resets_history_and_tiles() {
    let mut h = Harness::empty();
    let staff = h.place_cell(EntityType::Staff, 3, 3);
    let version = h.editor.palette_version();

    let mut level = LevelFile::default();
    level.entities.push(Entity::Wall(EdgeEntity {
        edge_position: EdgePosition::top(8, 8),
    }));
    h.editor.load_level(&mut h.graph, &level).expect("load");

    assert_eq!(h.file(), level);
    assert!(!h.editor.can_undo());
    assert!(h.editor.tiles().is_stashed(staff));
    assert_eq!(h.editor.tiles().len(), 3);
    assert!(h.editor.palette_version() > version);
}

#[test]
fn rotation_keeps_tids_and_turns_edges() {
    let mut h = Harness::empty();
    let wall = single(&h.place(EntityType::Wall, edge(10, 10)));
    let rotated = h
        .editor
        .rotate_entities(&mut h.graph, &[wall], Turn::CounterClockwise, None)
        .expect("rotate");
    assert_eq!(single(&rotated), wall);
    let slot = h.editor.document().get(wall).map(|entity| entity.slot());
    // Quarter turn about cell (11, 10): its left edge becomes its bottom edge.
    assert_eq!(slot, Some(Slot::Edge(EdgePosition::top(11, 9))));

    let one_way = single(&h.place(EntityType::OneWay, edge(12, 12)));
    h.editor
        .flip_one_ways(&mut h.graph, &[one_way, wall], None)
        .expect("flip");
    match h.editor.document().get(one_way) {
        Some(Entity::OneWay(entity)) => assert_eq!(entity.pass_direction(), Rotation::Left),
        other => panic!("expected a one-way, got {other:?}"),
    }
}

#[test]
fn update_entity_keeps_type_and_tid() {
    let mut h = Harness::empty();
    let door = single(&h.place(EntityType::Door, edge(4, 4)));
    let rewired = Entity::create(
        EntityType::Door,
        Position::new(4, 4),
        EdgeAlignment::Right,
        Rotation::Right,
        false,
    )
    .with_channel(5);
    h.editor
        .update_entity(&mut h.graph, door, rewired, None)
        .expect("update");
    assert_eq!(h.editor.document().get(door), Some(rewired));

    let before = h.file();
    let staff = Entity::Staff(CellEntity {
        position: Position::new(4, 4),
    });
    h.editor
        .update_entity(&mut h.graph, door, staff, None)
        .expect("update");
    assert_eq!(h.file(), before);
}

#[test]
fn preview_time_moves_explosion_visuals() {
    let mut h = Harness::empty();
    let request = PlaceRequest {
        rotation: Rotation::Up,
        ..PlaceRequest::new(EntityType::Explosion, Slot::Cell(Position::new(5, 5)))
    };
    let explosion = single(&h.editor.place_tile(&mut h.graph, request, None).expect("place"));

    h.editor.set_preview_time(&mut h.graph, 3);
    let target = h.editor.tiles().visual_mut(&mut h.graph, explosion).expect("visual").target();
    assert_eq!(target, Position::new(5, 8).center());

    h.editor.remove_tiles(&mut h.graph, &[explosion], None).expect("remove");
    assert!(!h.editor.tiles().is_stashed(explosion));
}

#[test]
fn runaway_explosion_loads_with_a_clamped_visual() {
    let level = LevelFile {
        explosions: vec![Explosion {
            direction: Rotation::Right,
            start_time: -1,
            start_position: Position::new(5, 5),
            speed: 1e10,
        }],
        ..LevelFile::default()
    };
    let mut h = Harness::new(&level);
    let explosion = h
        .editor
        .document()
        .iter()
        .find(|item| item.entity.entity_type() == EntityType::Explosion)
        .expect("explosion loaded")
        .tid;

    let clamped = Position::new(5 + MAX_WAVEFRONT_STEPS, 5).center();
    let target = h.editor.tiles().visual_mut(&mut h.graph, explosion).expect("visual").target();
    assert_eq!(target, clamped);

    h.editor.set_preview_time(&mut h.graph, i32::MAX);
    let target = h.editor.tiles().visual_mut(&mut h.graph, explosion).expect("visual").target();
    assert_eq!(target, clamped);
    assert_eq!(h.file(), level);
}

#[test]
fn highlights_snap_after_undo() {
    let mut h = Harness::empty();
    let staff = h.place_cell(EntityType::Staff, 6, 6);
    h.editor.remove_tiles(&mut h.graph, &[staff], None).expect("remove");
    h.editor.undo(&mut h.graph).expect("undo");
    let highlight = h.editor.tiles().visual_mut(&mut h.graph, staff).expect("visual").highlight();
    assert_eq!(highlight, 1.0);
}

#[test]
fn editor_scene_turns_clicks_and_shortcuts_into_edits() {
    let mut engine = Engine::new(EngineConfig::default());
    let graph = engine
        .add_scene(EDITOR_SCENE, SceneSpace::World)
        .expect("scene");
    let editor = LevelEditor::new(
        graph,
        &LevelFile::default(),
        Box::new(InMemorySettings::default()),
        false,
    )
    .expect("editor");
    let scene = EditorScene::new(graph, editor).expect("editor scene");
    engine
        .set_scene_behavior(EDITOR_SCENE, scene)
        .expect("behavior");
    let mut surface = RecordingSurface::new(320, 320);
    engine.tick(0.016, &mut surface);

    // The camera starts over the entrance center, so this is world (1.0, 0.5).
    engine.push_input(RawInput::PointerMoved(Vec2::new(176.0, 160.0)));
    engine.push_input(RawInput::PointerDown(PointerButton::Left));
    engine.push_input(RawInput::PointerUp(PointerButton::Left));
    let report = engine.tick(0.016, &mut surface);
    assert!(report.rendered);

    let count = |engine: &mut Engine| {
        engine
            .with_scene::<EditorScene, _>(EDITOR_SCENE, |scene, _| {
                scene.editor().document().count_of(EntityType::Wall)
            })
            .expect("editor scene")
    };
    assert_eq!(count(&mut engine), 1);
    let wall = engine
        .with_scene::<EditorScene, _>(EDITOR_SCENE, |scene, _| {
            scene.editor().tiles().at_slot(edge(0, 0)).count()
        })
        .expect("editor scene");
    assert_eq!(wall, 1);

    engine.push_input(RawInput::KeyDown(Key::Control));
    engine.push_input(RawInput::KeyDown(Key::Char('z')));
    engine.tick(0.016, &mut surface);
    assert_eq!(count(&mut engine), 0);

    engine.push_input(RawInput::KeyDown(Key::Char('y')));
    engine.tick(0.016, &mut surface);
    assert_eq!(count(&mut engine), 1);

    let brush_type = |engine: &mut Engine| {
        engine
            .with_scene::<EditorScene, _>(EDITOR_SCENE, |scene, _| {
                scene.editor().settings().brush().entity_type
            })
            .expect("editor scene")
    };
    engine.push_input(RawInput::KeyUp(Key::Char('y')));
    engine.push_input(RawInput::KeyUp(Key::Char('z')));
    engine.push_input(RawInput::KeyUp(Key::Control));
    engine.push_input(RawInput::KeyDown(Key::Char('b')));
    engine.tick(0.016, &mut surface);
    assert_eq!(brush_type(&mut engine), EntityType::Curtain);

    engine.push_input(RawInput::KeyUp(Key::Char('b')));
    engine.push_input(RawInput::KeyDown(Key::Shift));
    engine.push_input(RawInput::KeyDown(Key::Char('b')));
    engine.tick(0.016, &mut surface);
    assert_eq!(brush_type(&mut engine), EntityType::Wall);
}
