use super::tiles::TileGrid;
use crate::level::{can_overlap, metadata, Entity, EntityType, LevelDocument, Position, Slot, Tid, TileOwnership};

/// Whether placing `new` must displace `existing`.
pub fn conflicts(new: &Entity, existing: &Entity) -> bool {
    if new.slot() != existing.slot() {
        return false;
    }
    let (a, b) = (new.entity_type(), existing.entity_type());
    if a == b {
        return true;
    }
    if can_overlap(a, b) {
        return false;
    }
    metadata(a).ownership == TileOwnership::OnlyEntityInTile
}

/// tIDs of live tiles that `entity` would displace, skipping `exclude`.
pub fn find_conflicts(tiles: &TileGrid, entity: &Entity, exclude: &[Tid]) -> Vec<Tid> {
    tiles
        .at_slot(entity.slot())
        .filter(|tile| !exclude.contains(&tile.tid))
        .filter(|tile| conflicts(entity, &tile.entity))
        .map(|tile| tile.tid)
        .collect()
}

/// Entrance and exit cells after an edit, with the tID owning each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalCells {
    pub entrance: (Tid, Position),
    pub exit: (Tid, Position),
}

impl CriticalCells {
    pub fn of(document: &LevelDocument) -> Self {
        Self {
            entrance: (document.entrance().tid, document.entrance_position()),
            exit: (document.exit().tid, document.exit_position()),
        }
    }

    /// Applies a pending marker move.
    pub fn with_moved(mut self, tid: Tid, entity: &Entity) -> Self {
        let position = entity.slot().cell();
        if tid == self.entrance.0 {
            self.entrance.1 = position;
        } else if tid == self.exit.0 {
            self.exit.1 = position;
        }
        self
    }

    pub fn markers_collide(&self) -> bool {
        self.entrance.1 == self.exit.1
    }

    /// Whether `entity` (owned by `tid`, if it already exists) would sit on a critical cell
    /// it does not own. Only cell entities other than explosions are restricted.
    pub fn blocks(&self, tid: Option<Tid>, entity: &Entity) -> bool {
        let Slot::Cell(position) = entity.slot() else {
            return false;
        };
        if entity.entity_type() == EntityType::Explosion {
            return false;
        }
        [self.entrance, self.exit]
            .into_iter()
            .any(|(owner, cell)| Some(owner) != tid && cell == position)
    }
}
