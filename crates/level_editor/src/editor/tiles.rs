use std::collections::{HashMap, VecDeque};

use engine::{Entity as Node, EngineError, EntityId, PointerTarget, SceneGraph};
use tracing::debug;

use super::visual::{hit_bounds, TileVariant, TileVisual};
use crate::level::{EdgeAlignment, Entity, EntityType, Slot, Tid};

/// Stashed tiles kept for reuse before the oldest are destroyed.
pub const STASH_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Cell,
    Edge(EdgeAlignment),
}

/// Dictionary key of a tile: grid slot plus entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub x: i32,
    pub y: i32,
    pub slot: SlotKind,
    pub entity_type: EntityType,
}

impl PositionKey {
    pub fn at(slot: Slot, entity_type: EntityType) -> Self {
        let cell = slot.cell();
        let kind = match slot {
            Slot::Cell(_) => SlotKind::Cell,
            Slot::Edge(edge) => SlotKind::Edge(edge.alignment),
        };
        Self {
            x: cell.x,
            y: cell.y,
            slot: kind,
            entity_type,
        }
    }

    pub fn of(entity: &Entity) -> Self {
        Self::at(entity.slot(), entity.entity_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub tid: Tid,
    pub entity: Entity,
    pub variant: TileVariant,
    pub visual: EntityId,
}

impl Tile {
    pub fn key(&self) -> PositionKey {
        PositionKey::of(&self.entity)
    }
}

#[derive(Debug, Default)]
struct TileSlot {
    generation: u32,
    tile: Option<Tile>,
    live: bool,
}

/// Live tiles keyed by grid slot, plus the stash of disabled tiles kept for reuse.
#[derive(Debug)]
pub struct TileGrid {
    layer: EntityId,
    palette: u8,
    show_images: bool,
    slots: Vec<TileSlot>,
    free: Vec<u32>,
    by_key: HashMap<PositionKey, TileHandle>,
    by_tid: HashMap<Tid, TileHandle>,
    by_visual: HashMap<EntityId, TileHandle>,
    stash: VecDeque<TileHandle>,
}

impl TileGrid {
    pub fn new(layer: EntityId, palette: u8, show_images: bool) -> Self {
        Self {
            layer,
            palette,
            show_images,
            slots: Vec::new(),
            free: Vec::new(),
            by_key: HashMap::new(),
            by_tid: HashMap::new(),
            by_visual: HashMap::new(),
            stash: VecDeque::new(),
        }
    }

    pub fn layer(&self) -> EntityId {
        self.layer
    }

    pub fn len(&self) -> usize {
        self.by_tid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tid.is_empty()
    }

    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    pub fn get(&self, handle: TileHandle) -> Option<&Tile> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.live)
            .and_then(|slot| slot.tile.as_ref())
    }

    fn get_any(&self, handle: TileHandle) -> Option<&Tile> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.tile.as_ref())
    }

    pub fn handle(&self, tid: Tid) -> Option<TileHandle> {
        self.by_tid.get(&tid).copied()
    }

    pub fn by_tid(&self, tid: Tid) -> Option<&Tile> {
        self.handle(tid).and_then(|handle| self.get(handle))
    }

    pub fn at(&self, key: &PositionKey) -> Option<&Tile> {
        self.by_key.get(key).and_then(|handle| self.get(*handle))
    }

    /// Every live tile sharing `slot`, whatever its type.
    pub fn at_slot(&self, slot: Slot) -> impl Iterator<Item = &Tile> + '_ {
        EntityType::ALL
            .into_iter()
            .filter_map(move |entity_type| self.at(&PositionKey::at(slot, entity_type)))
    }

    pub fn tid_for_visual(&self, visual: EntityId) -> Option<Tid> {
        self.by_visual
            .get(&visual)
            .and_then(|handle| self.get(*handle))
            .map(|tile| tile.tid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.live)
            .filter_map(|slot| slot.tile.as_ref())
    }

    pub fn is_stashed(&self, tid: Tid) -> bool {
        self.stash
            .iter()
            .any(|handle| self.get_any(*handle).is_some_and(|tile| tile.tid == tid))
    }

    /// Gives `entity` a live tile, refreshing it in place, reclaiming it from the stash, or
    /// creating a new one.
    pub fn claim(&mut self, graph: &mut SceneGraph, tid: Tid, entity: Entity) -> Result<TileHandle, EngineError> {
        let key = PositionKey::of(&entity);
        if let Some(existing) = self.at(&key).copied() {
            if existing.tid != tid {
                debug!(tid = %existing.tid, "tile_slot_taken_over");
                self.release(graph, existing.tid);
            }
        }

        if let Some(handle) = self.handle(tid) {
            self.update_tile(graph, handle, entity, false);
            return Ok(handle);
        }

        if let Some(position) = self
            .stash
            .iter()
            .position(|handle| self.get_any(*handle).is_some_and(|tile| tile.tid == tid))
        {
            if let Some(handle) = self.stash.remove(position) {
                if let Some(slot) = self.slots.get_mut(handle.index as usize) {
                    slot.live = true;
                }
                self.update_tile(graph, handle, entity, true);
                if let Some(tile) = self.get(handle).copied() {
                    graph.set_enabled(tile.visual, true);
                    self.by_visual.insert(tile.visual, handle);
                }
                self.by_tid.insert(tid, handle);
                return Ok(handle);
            }
        }

        let variant = TileVariant::for_entity(&entity);
        let center = entity.slot().world_center();
        let visual = graph.add_child(
            self.layer,
            Node::new(format!("tile_{tid}"))
                .with_position(center)
                .with_z_index(tile_z_index(&entity))
                .with_component(TileVisual::new(entity, variant, self.palette, self.show_images))
                .with_component(PointerTarget::new(hit_bounds(&entity))),
        )?;
        let handle = self.insert_slot(Tile {
            tid,
            entity,
            variant,
            visual,
        });
        self.by_key.insert(key, handle);
        self.by_tid.insert(tid, handle);
        self.by_visual.insert(visual, handle);
        Ok(handle)
    }

    /// Takes a tile off the grid. Explosion tiles are destroyed, the rest are stashed.
    pub fn release(&mut self, graph: &mut SceneGraph, tid: Tid) -> Option<Tile> {
        let handle = self.by_tid.remove(&tid)?;
        let tile = *self.get(handle)?;
        if self.by_key.get(&tile.key()) == Some(&handle) {
            self.by_key.remove(&tile.key());
        }
        self.by_visual.remove(&tile.visual);

        if tile.variant == TileVariant::Explosion {
            self.destroy(graph, handle);
            return Some(tile);
        }

        graph.set_enabled(tile.visual, false);
        if let Some(slot) = self.slots.get_mut(handle.index as usize) {
            slot.live = false;
        }
        self.stash.push_back(handle);
        while self.stash.len() > STASH_CAPACITY {
            if let Some(oldest) = self.stash.pop_front() {
                self.destroy(graph, oldest);
            }
        }
        Some(tile)
    }

    /// Stashes every live tile.
    pub fn release_all(&mut self, graph: &mut SceneGraph) {
        let tids: Vec<Tid> = self.iter().map(|tile| tile.tid).collect();
        for tid in tids {
            self.release(graph, tid);
        }
    }

    pub fn visual_mut<'g>(&self, graph: &'g mut SceneGraph, tid: Tid) -> Option<&'g mut TileVisual> {
        let tile = self.by_tid(tid)?;
        graph.component_mut::<TileVisual>(tile.visual)
    }

    /// Restyles live and stashed tiles.
    pub fn set_palette(&mut self, graph: &mut SceneGraph, palette: u8) {
        self.palette = palette;
        for slot in &self.slots {
            if let Some(tile) = slot.tile.as_ref() {
                if let Some(visual) = graph.component_mut::<TileVisual>(tile.visual) {
                    visual.set_palette(palette);
                }
            }
        }
        graph.request_render();
    }

    fn update_tile(&mut self, graph: &mut SceneGraph, handle: TileHandle, entity: Entity, snap: bool) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        let Some(tile) = slot.tile.as_mut() else {
            return;
        };
        let old_key = tile.key();
        tile.entity = entity;
        tile.variant = TileVariant::for_entity(&entity);
        let tile = *tile;

        if self.by_key.get(&old_key) == Some(&handle) {
            self.by_key.remove(&old_key);
        }
        self.by_key.insert(tile.key(), handle);

        if let Some(visual) = graph.component_mut::<TileVisual>(tile.visual) {
            visual.set_entity(entity);
            visual.set_palette(self.palette);
        }
        if let Some(target) = graph.component_mut::<PointerTarget>(tile.visual) {
            target.rect = hit_bounds(&entity);
        }
        graph.set_z_index(tile.visual, tile_z_index(&entity));
        if snap {
            graph.set_position(tile.visual, entity.slot().world_center());
        }
        graph.request_render();
    }

    fn insert_slot(&mut self, tile: Tile) -> TileHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.tile = Some(tile);
            slot.live = true;
            return TileHandle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(TileSlot {
            generation: 0,
            tile: Some(tile),
            live: true,
        });
        TileHandle {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn destroy(&mut self, graph: &mut SceneGraph, handle: TileHandle) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else {
            return;
        };
        if slot.generation != handle.generation {
            return;
        }
        if let Some(tile) = slot.tile.take() {
            graph.remove(tile.visual);
        }
        slot.live = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }
}

/// Edges draw above cells and explosions above both.
fn tile_z_index(entity: &Entity) -> i32 {
    match entity.entity_type() {
        EntityType::Explosion => 2,
        _ => match entity.slot() {
            Slot::Edge(_) => 1,
            Slot::Cell(_) => 0,
        },
    }
}
