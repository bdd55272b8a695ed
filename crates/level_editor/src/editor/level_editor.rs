use engine::{hit_test, EngineError, Entity as Node, SceneGraph};
use glam::Vec2;
use tracing::{debug, info};

use super::history::{EditAction, EditGroup, EditKind, History, TransactionHash};
use super::overlap::{find_conflicts, CriticalCells};
use super::rotation::{flip_one_way, pivot_cell, rotate_entity, Turn};
use super::settings::{Brush, EditorSettings, Selection};
use super::tiles::{PositionKey, TileGrid};
use crate::level::{
    in_bounds, metadata, EdgeAlignment, EdgePosition, Entity, EntityType, LevelDocument,
    LevelEntity, LevelFile, Position, Rotation, Slot, Tid, TidGenerator, MAX_COLOR_PALETTE,
};

pub type LevelListener = Box<dyn FnMut(&LevelDocument)>;

/// A brush stroke at one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceRequest {
    pub entity_type: EntityType,
    pub position: Position,
    pub alignment: EdgeAlignment,
    pub rotation: Rotation,
    pub flip_direction: bool,
    pub channel: i32,
}

impl PlaceRequest {
    pub fn new(entity_type: EntityType, slot: Slot) -> Self {
        let alignment = match slot {
            Slot::Edge(edge) => edge.alignment,
            Slot::Cell(_) => EdgeAlignment::Right,
        };
        Self {
            entity_type,
            position: slot.cell(),
            alignment,
            rotation: Rotation::Right,
            flip_direction: false,
            channel: 0,
        }
    }

    pub fn from_brush(brush: Brush, slot: Slot) -> Self {
        Self {
            rotation: brush.rotation,
            flip_direction: brush.flip_direction,
            channel: brush.channel,
            ..Self::new(brush.entity_type, slot)
        }
    }

    pub fn entity(&self) -> Entity {
        Entity::create(
            self.entity_type,
            self.position,
            self.alignment,
            self.rotation,
            self.flip_direction,
        )
        .with_channel(self.channel)
    }
}

/// Probe for removal: removes whatever an entity of `entity_type` placed here would displace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveQuery {
    pub entity_type: EntityType,
    pub position: Position,
    pub alignment: EdgeAlignment,
}

impl RemoveQuery {
    pub fn at(entity_type: EntityType, slot: Slot) -> Self {
        let request = PlaceRequest::new(entity_type, slot);
        Self {
            entity_type,
            position: request.position,
            alignment: request.alignment,
        }
    }

    fn candidate(&self) -> Entity {
        PlaceRequest {
            entity_type: self.entity_type,
            position: self.position,
            alignment: self.alignment,
            rotation: Rotation::Right,
            flip_direction: false,
            channel: 0,
        }
        .entity()
    }
}

/// Owns the level document, its tiles and the undo history. Every mutation goes through here.
pub struct LevelEditor {
    document: LevelDocument,
    tiles: TileGrid,
    history: History,
    tids: TidGenerator,
    next_hash: u64,
    settings: Box<dyn EditorSettings>,
    listener: Option<LevelListener>,
    palette_version: u64,
    preview_time: i32,
}

impl LevelEditor {
    /// Adds the tile layer under `graph`'s root and builds tiles for `level`.
    pub fn new(
        graph: &mut SceneGraph,
        level: &LevelFile,
        settings: Box<dyn EditorSettings>,
        show_images: bool,
    ) -> Result<Self, EngineError> {
        let root = graph.root();
        let layer = graph.add_child(root, Node::new("tiles"))?;
        let mut tids = TidGenerator::default();
        let document = LevelDocument::from_file(level, &mut tids);
        let mut editor = Self {
            tiles: TileGrid::new(layer, document.color_palette, show_images),
            document,
            history: History::default(),
            tids,
            next_hash: 0,
            settings,
            listener: None,
            palette_version: 0,
            preview_time: 0,
        };
        editor.claim_all(graph)?;
        Ok(editor)
    }

    /// Replaces the level: stashes every tile, forgets history, then rebuilds tiles.
    pub fn load_level(&mut self, graph: &mut SceneGraph, level: &LevelFile) -> Result<(), EngineError> {
        self.tiles.release_all(graph);
        self.document = LevelDocument::from_file(level, &mut self.tids);
        self.history.clear();
        self.settings.set_selection(Selection::new());
        self.claim_all(graph)?;
        self.tiles.set_palette(graph, self.document.color_palette);
        self.palette_version += 1;
        info!(
            entities = self.document.entity_count(),
            palette = self.document.color_palette,
            "level_loaded"
        );
        self.notify();
        Ok(())
    }

    fn claim_all(&mut self, graph: &mut SceneGraph) -> Result<(), EngineError> {
        let items: Vec<LevelEntity> = self.document.iter().collect();
        for item in items {
            self.tiles.claim(graph, item.tid, item.entity)?;
            self.apply_preview(graph, item.tid, &item.entity);
        }
        Ok(())
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&LevelDocument) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn document(&self) -> &LevelDocument {
        &self.document
    }

    pub fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn entity_count(&self) -> usize {
        self.document.entity_count()
    }

    pub fn settings(&self) -> &dyn EditorSettings {
        self.settings.as_ref()
    }

    pub fn settings_mut(&mut self) -> &mut dyn EditorSettings {
        self.settings.as_mut()
    }

    pub fn selection(&self) -> Selection {
        self.settings.selection().clone()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn palette_version(&self) -> u64 {
        self.palette_version
    }

    pub fn preview_time(&self) -> i32 {
        self.preview_time
    }

    pub fn begin_transaction(&mut self) -> TransactionHash {
        self.next_hash += 1;
        TransactionHash(self.next_hash)
    }

    fn is_locked(&self, entity_type: EntityType) -> bool {
        self.settings.is_layer_locked(metadata(entity_type).layer)
    }

    /// Markers and entities on locked layers cannot be removed or displaced.
    fn is_protected(&self, tid: Tid) -> bool {
        self.document.is_marker(tid)
            || self
                .document
                .get(tid)
                .is_some_and(|entity| self.is_locked(entity.entity_type()))
    }

    fn reject(&self, reason: &'static str) -> Selection {
        debug!(reason, "edit_rejected");
        self.selection()
    }

    /// Whether a brush placement of `entity` would be accepted right now.
    pub fn placement_allowed(&self, entity: &Entity) -> bool {
        if !in_bounds(entity.slot().cell()) || self.is_locked(entity.entity_type()) {
            return false;
        }
        let marker = match entity.entity_type() {
            EntityType::TimeMachine => Some(self.document.entrance().tid),
            EntityType::Exit => Some(self.document.exit().tid),
            _ => None,
        };
        let mut critical = CriticalCells::of(&self.document);
        if let Some(tid) = marker {
            critical = critical.with_moved(tid, entity);
            if critical.markers_collide() {
                return false;
            }
        }
        if critical.blocks(marker, entity) {
            return false;
        }
        let exclude: Vec<Tid> = marker.into_iter().collect();
        let displaced = find_conflicts(&self.tiles, entity, &exclude);
        if displaced.iter().any(|tid| self.is_protected(*tid)) {
            return false;
        }
        marker.is_some() || !self.document.is_full() || !displaced.is_empty()
    }

    /// Places one entity as its own undo group, or as part of `hash`.
    ///
    /// Rejected placements (critical cell, full level, locked layer, out of bounds) change
    /// nothing and return the current selection. Placing the time machine or the exit moves
    /// the existing marker.
    pub fn place_tile(
        &mut self,
        graph: &mut SceneGraph,
        request: PlaceRequest,
        hash: Option<TransactionHash>,
    ) -> Result<Selection, EngineError> {
        let entity = request.entity();
        if !in_bounds(entity.slot().cell()) {
            return Ok(self.reject("out_of_bounds"));
        }
        if self.is_locked(entity.entity_type()) {
            return Ok(self.reject("locked_layer"));
        }
        let hash = hash.unwrap_or_else(|| self.begin_transaction());

        let marker = match entity.entity_type() {
            EntityType::TimeMachine => Some(self.document.entrance().tid),
            EntityType::Exit => Some(self.document.exit().tid),
            _ => None,
        };
        if let Some(tid) = marker {
            return self.replace_entities(graph, vec![(tid, entity)], hash);
        }

        if CriticalCells::of(&self.document).blocks(None, &entity) {
            return Ok(self.reject("critical_cell"));
        }
        if let Some(existing) = self.tiles.at(&PositionKey::of(&entity)).copied() {
            if existing.entity == entity {
                self.tiles.claim(graph, existing.tid, entity)?;
                return Ok(self.select([existing.tid]));
            }
        }
        let displaced = find_conflicts(&self.tiles, &entity, &[]);
        if displaced.iter().any(|tid| self.is_protected(*tid)) {
            return Ok(self.reject("protected_overlap"));
        }
        if self.document.is_full() && displaced.is_empty() {
            return Ok(self.reject("entity_cap"));
        }

        let tid = self.tids.next_tid();
        self.perform_edit_actions(graph, vec![EditAction::place(tid, entity)], hash, true)
    }

    /// Applies `actions` in order.
    ///
    /// When recording, every placement first displaces whatever it conflicts with, the
    /// expanded list becomes one undo group and the redo stack is cleared. Replays pass
    /// `record = false` and apply exactly what they are given.
    pub fn perform_edit_actions(
        &mut self,
        graph: &mut SceneGraph,
        actions: Vec<EditAction>,
        hash: TransactionHash,
        record: bool,
    ) -> Result<Selection, EngineError> {
        let mut applied = Vec::with_capacity(actions.len());
        for action in actions {
            if record && action.kind == EditKind::Place {
                for tid in find_conflicts(&self.tiles, &action.entity, &[action.tid]) {
                    if let Some(entity) = self.document.get(tid) {
                        let displaced = EditAction::remove(tid, entity);
                        self.apply(graph, displaced)?;
                        applied.push(displaced);
                    }
                }
            }
            self.apply(graph, action)?;
            applied.push(action);
        }

        let selection: Selection = applied
            .iter()
            .filter(|action| action.kind == EditKind::Place)
            .map(|action| action.tid)
            .filter(|tid| self.tiles.by_tid(*tid).is_some())
            .collect();
        if record && !applied.is_empty() {
            info!(
                hash = hash.0,
                actions = applied.len(),
                entities = self.document.entity_count(),
                "edit_committed"
            );
            self.history.record(EditGroup {
                hash,
                actions: applied,
            });
        }
        self.settings.set_selection(selection.clone());
        self.notify();
        Ok(selection)
    }

    fn apply(&mut self, graph: &mut SceneGraph, action: EditAction) -> Result<(), EngineError> {
        match action.kind {
            EditKind::Place => {
                self.document.upsert(LevelEntity {
                    tid: action.tid,
                    entity: action.entity,
                });
                self.tiles.claim(graph, action.tid, action.entity)?;
                self.apply_preview(graph, action.tid, &action.entity);
            }
            EditKind::Remove => {
                // Markers only leave the grid while being moved; the document keeps them.
                self.document.remove(action.tid);
                self.tiles.release(graph, action.tid);
            }
        }
        Ok(())
    }

    /// Removes every entity the candidates would displace, as one group.
    pub fn remove_entities(
        &mut self,
        graph: &mut SceneGraph,
        queries: &[RemoveQuery],
        hash: Option<TransactionHash>,
    ) -> Result<usize, EngineError> {
        let mut targets: Vec<Tid> = Vec::new();
        for query in queries {
            for tid in find_conflicts(&self.tiles, &query.candidate(), &[]) {
                if !targets.contains(&tid) && !self.is_protected(tid) {
                    targets.push(tid);
                }
            }
        }
        self.remove_tids(graph, targets, hash)
    }

    /// Removes exactly these entities, skipping markers and locked layers.
    pub fn remove_tiles(
        &mut self,
        graph: &mut SceneGraph,
        tids: &[Tid],
        hash: Option<TransactionHash>,
    ) -> Result<usize, EngineError> {
        let mut targets: Vec<Tid> = Vec::new();
        for &tid in tids {
            if self.document.contains(tid) && !self.is_protected(tid) && !targets.contains(&tid) {
                targets.push(tid);
            }
        }
        self.remove_tids(graph, targets, hash)
    }

    fn remove_tids(
        &mut self,
        graph: &mut SceneGraph,
        targets: Vec<Tid>,
        hash: Option<TransactionHash>,
    ) -> Result<usize, EngineError> {
        let actions: Vec<EditAction> = targets
            .iter()
            .filter_map(|&tid| self.document.get(tid).map(|entity| EditAction::remove(tid, entity)))
            .collect();
        if actions.is_empty() {
            return Ok(0);
        }
        let remaining: Selection = self
            .settings
            .selection()
            .iter()
            .copied()
            .filter(|tid| !targets.contains(tid))
            .collect();
        let hash = hash.unwrap_or_else(|| self.begin_transaction());
        let removed = actions.len();
        self.perform_edit_actions(graph, actions, hash, true)?;
        self.settings.set_selection(remaining);
        Ok(removed)
    }

    /// Shifts entities by whole cells as one group. Markers may move; the destination is
    /// still checked.
    pub fn move_entities(
        &mut self,
        graph: &mut SceneGraph,
        tids: &[Tid],
        dx: i32,
        dy: i32,
        hash: Option<TransactionHash>,
    ) -> Result<Selection, EngineError> {
        if dx == 0 && dy == 0 {
            return Ok(self.selection());
        }
        let replacements = tids
            .iter()
            .filter_map(|&tid| self.document.get(tid).map(|entity| (tid, entity.translated(dx, dy))))
            .collect();
        let hash = hash.unwrap_or_else(|| self.begin_transaction());
        self.replace_entities(graph, replacements, hash)
    }

    /// Quarter-turns entities about the cell nearest their center.
    pub fn rotate_entities(
        &mut self,
        graph: &mut SceneGraph,
        tids: &[Tid],
        turn: Turn,
        hash: Option<TransactionHash>,
    ) -> Result<Selection, EngineError> {
        let entities: Vec<(Tid, Entity)> = tids
            .iter()
            .filter_map(|&tid| self.document.get(tid).map(|entity| (tid, entity)))
            .collect();
        let Some(pivot) = pivot_cell(entities.iter().map(|(_, entity)| entity)) else {
            return Ok(self.selection());
        };
        let replacements = entities
            .into_iter()
            .map(|(tid, entity)| (tid, rotate_entity(entity, pivot, turn)))
            .collect();
        let hash = hash.unwrap_or_else(|| self.begin_transaction());
        self.replace_entities(graph, replacements, hash)
    }

    /// Reverses the pass direction of every selected one-way.
    pub fn flip_one_ways(
        &mut self,
        graph: &mut SceneGraph,
        tids: &[Tid],
        hash: Option<TransactionHash>,
    ) -> Result<Selection, EngineError> {
        let replacements: Vec<(Tid, Entity)> = tids
            .iter()
            .filter_map(|&tid| self.document.get(tid).map(|entity| (tid, entity)))
            .filter(|(_, entity)| entity.entity_type() == EntityType::OneWay)
            .map(|(tid, entity)| (tid, flip_one_way(entity)))
            .collect();
        if replacements.is_empty() {
            return Ok(self.selection());
        }
        let hash = hash.unwrap_or_else(|| self.begin_transaction());
        self.replace_entities(graph, replacements, hash)
    }

    /// Replaces the fields of one entity, keeping its tID and type.
    pub fn update_entity(
        &mut self,
        graph: &mut SceneGraph,
        tid: Tid,
        entity: Entity,
        hash: Option<TransactionHash>,
    ) -> Result<Selection, EngineError> {
        match self.document.get(tid) {
            Some(current) if current.entity_type() == entity.entity_type() => {}
            _ => return Ok(self.reject("update_type_mismatch")),
        }
        let hash = hash.unwrap_or_else(|| self.begin_transaction());
        self.replace_entities(graph, vec![(tid, entity)], hash)
    }

    /// Swaps existing entities for new versions of themselves, all or nothing.
    fn replace_entities(
        &mut self,
        graph: &mut SceneGraph,
        replacements: Vec<(Tid, Entity)>,
        hash: TransactionHash,
    ) -> Result<Selection, EngineError> {
        let mut unchanged = Vec::new();
        let mut pairs: Vec<(Tid, Entity, Entity)> = Vec::new();
        for (tid, new) in replacements {
            match self.document.get(tid) {
                Some(old) if old == new => unchanged.push(tid),
                Some(old) => pairs.push((tid, old, new)),
                None => {}
            }
        }
        if pairs.is_empty() {
            return Ok(if unchanged.is_empty() {
                self.selection()
            } else {
                self.select(unchanged)
            });
        }

        if pairs.iter().any(|(_, _, new)| !in_bounds(new.slot().cell())) {
            return Ok(self.reject("out_of_bounds"));
        }
        if pairs.iter().any(|(_, old, new)| {
            self.is_locked(old.entity_type()) || self.is_locked(new.entity_type())
        }) {
            return Ok(self.reject("locked_layer"));
        }

        let critical = pairs
            .iter()
            .fold(CriticalCells::of(&self.document), |cells, (tid, _, new)| {
                cells.with_moved(*tid, new)
            });
        if critical.markers_collide()
            || pairs.iter().any(|(tid, _, new)| critical.blocks(Some(*tid), new))
        {
            return Ok(self.reject("critical_cell"));
        }

        let moving: Vec<Tid> = pairs.iter().map(|(tid, _, _)| *tid).collect();
        let protected_overlap = pairs.iter().any(|(_, _, new)| {
            find_conflicts(&self.tiles, new, &moving)
                .into_iter()
                .any(|tid| self.is_protected(tid))
        });
        if protected_overlap {
            return Ok(self.reject("protected_overlap"));
        }

        let actions = pairs
            .iter()
            .map(|(tid, old, _)| EditAction::remove(*tid, *old))
            .chain(pairs.iter().map(|(tid, _, new)| EditAction::place(*tid, *new)))
            .collect();
        self.perform_edit_actions(graph, actions, hash, true)
    }

    /// Reverts the newest transaction. Returns false when there is nothing to undo.
    pub fn undo(&mut self, graph: &mut SceneGraph) -> Result<bool, EngineError> {
        let groups = self.history.pop_undo();
        if groups.is_empty() {
            return Ok(false);
        }
        let mut affected = Selection::new();
        for group in &groups {
            for action in group.undo_actions() {
                self.apply(graph, action)?;
                track_affected(&mut affected, action);
            }
        }
        info!(groups = groups.len(), "edit_undone");
        self.history.push_redo(groups);
        self.finish_replay(graph, affected);
        Ok(true)
    }

    /// Re-applies the newest undone transaction. Returns false when there is nothing to redo.
    pub fn redo(&mut self, graph: &mut SceneGraph) -> Result<bool, EngineError> {
        let groups = self.history.pop_redo();
        if groups.is_empty() {
            return Ok(false);
        }
        let mut affected = Selection::new();
        for group in &groups {
            for action in &group.actions {
                self.apply(graph, *action)?;
                track_affected(&mut affected, *action);
            }
        }
        info!(groups = groups.len(), "edit_redone");
        self.history.push_undo(groups);
        self.finish_replay(graph, affected);
        Ok(true)
    }

    fn finish_replay(&mut self, graph: &mut SceneGraph, affected: Selection) {
        self.settings.set_selection(affected);
        self.sync_highlights(graph, None, true);
        self.notify();
    }

    /// Selects the live tiles among `tids`.
    pub fn select(&mut self, tids: impl IntoIterator<Item = Tid>) -> Selection {
        let selection: Selection = tids
            .into_iter()
            .filter(|tid| self.tiles.by_tid(*tid).is_some())
            .collect();
        self.settings.set_selection(selection.clone());
        selection
    }

    pub fn toggle_selected(&mut self, tid: Tid) -> Selection {
        let mut selection = self.selection();
        if !selection.remove(&tid) && self.tiles.by_tid(tid).is_some() {
            selection.insert(tid);
        }
        self.settings.set_selection(selection.clone());
        selection
    }

    pub fn clear_selection(&mut self) {
        self.settings.set_selection(Selection::new());
    }

    /// Selects tiles whose slot center lies inside the box spanned by `a` and `b`.
    pub fn select_in_box(&mut self, a: Vec2, b: Vec2, extend: bool) -> Selection {
        let (min, max) = (a.min(b), a.max(b));
        let inside = self.tiles.iter().filter_map(|tile| {
            let center = tile.entity.slot().world_center();
            (center.cmpge(min).all() && center.cmple(max).all()).then_some(tile.tid)
        });
        let mut selection: Selection = inside.collect();
        if extend {
            selection.extend(self.settings.selection().iter().copied());
        }
        self.settings.set_selection(selection.clone());
        selection
    }

    /// Topmost tile under a world point.
    pub fn pick(&self, graph: &mut SceneGraph, world: Vec2) -> Option<Tid> {
        graph.sort_pending();
        hit_test(graph, world).and_then(|visual| self.tiles.tid_for_visual(visual))
    }

    /// Drives tile highlight from the selection and the hovered tile.
    pub fn sync_highlights(&self, graph: &mut SceneGraph, hovered: Option<Tid>, snap: bool) {
        let selection = self.settings.selection();
        for tile in self.tiles.iter() {
            let level = if selection.contains(&tile.tid) {
                1.0
            } else if hovered == Some(tile.tid) {
                0.5
            } else {
                0.0
            };
            if let Some(visual) = graph.component_mut::<super::visual::TileVisual>(tile.visual) {
                if snap {
                    visual.snap_highlight(level);
                } else {
                    visual.set_highlight_target(level);
                }
            }
        }
        if snap {
            graph.request_render();
        }
    }

    /// Offsets tile visuals without touching the document.
    pub fn preview_offset(&self, graph: &mut SceneGraph, tids: &[Tid], offset: Vec2) {
        for &tid in tids {
            let Some(tile) = self.tiles.by_tid(tid) else {
                continue;
            };
            let target = tile.entity.slot().world_center() + offset;
            if let Some(visual) = self.tiles.visual_mut(graph, tid) {
                visual.set_target(target);
            }
        }
    }

    /// Sends visuals back to where the document says they are.
    pub fn restore_visuals(&self, graph: &mut SceneGraph, tids: &[Tid]) {
        self.preview_offset(graph, tids, Vec2::ZERO);
        for &tid in tids {
            if let Some(tile) = self.tiles.by_tid(tid).copied() {
                self.apply_preview(graph, tid, &tile.entity);
            }
        }
    }

    pub fn set_color_palette(&mut self, graph: &mut SceneGraph, palette: u8) -> bool {
        if palette > MAX_COLOR_PALETTE {
            return false;
        }
        if palette == self.document.color_palette {
            return true;
        }
        self.document.color_palette = palette;
        self.tiles.set_palette(graph, palette);
        self.palette_version += 1;
        info!(palette, "color_palette_changed");
        self.notify();
        true
    }

    /// Moves explosion visuals to where their wavefront is at `time`.
    pub fn set_preview_time(&mut self, graph: &mut SceneGraph, time: i32) {
        self.preview_time = time;
        let explosions: Vec<(Tid, Entity)> = self
            .tiles
            .iter()
            .filter(|tile| tile.entity.entity_type() == EntityType::Explosion)
            .map(|tile| (tile.tid, tile.entity))
            .collect();
        for (tid, entity) in explosions {
            self.apply_preview(graph, tid, &entity);
        }
    }

    fn apply_preview(&self, graph: &mut SceneGraph, tid: Tid, entity: &Entity) {
        if let Entity::Explosion(explosion) = entity {
            let target = explosion.position_at(self.preview_time).center();
            if let Some(visual) = self.tiles.visual_mut(graph, tid) {
                visual.set_target(target);
            }
        }
    }

    /// Slot a brush of `entity_type` would paint at a world point.
    pub fn slot_at(entity_type: EntityType, world: Vec2) -> Slot {
        match metadata(entity_type).position_type {
            crate::level::PositionType::Edge => Slot::Edge(EdgePosition::nearest(world)),
            crate::level::PositionType::Cell => Slot::Cell(Position::containing(world)),
        }
    }

    fn notify(&mut self) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.document);
        }
    }
}

fn track_affected(affected: &mut Selection, action: EditAction) {
    match action.kind {
        EditKind::Place => {
            affected.insert(action.tid);
        }
        EditKind::Remove => {
            affected.remove(&action.tid);
        }
    }
}
