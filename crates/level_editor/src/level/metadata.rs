use serde::{Deserialize, Serialize};

use super::types::EntityType;

pub const LEVEL_VERSION: u32 = 0;
/// Entities plus explosions plus entrance and exit.
pub const MAX_ENTITY_COUNT: usize = 4000;
pub const MAX_COLOR_PALETTE: u8 = 6;
/// Largest absolute x or y a level coordinate may take.
pub const COORDINATE_LIMIT: i32 = 256;
pub const MAX_LEVEL_FILE_BYTES: u64 = 1024 * 1024;
/// Cells per tick, one full level width.
pub const MAX_EXPLOSION_SPEED: f32 = (2 * COORDINATE_LIMIT) as f32;
/// Largest absolute explosion start time, in ticks.
pub const MAX_EXPLOSION_START_TIME: i32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionType {
    Cell,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileOwnership {
    /// Excludes every other entity from the slot.
    OnlyEntityInTile,
    /// Excludes only entities of the same type.
    OnlyTypeInTile,
}

/// Editing layer an entity type belongs to; locked layers reject edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    Edges,
    Objects,
    Wiring,
    Hazards,
    Markers,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::Edges,
        Layer::Objects,
        Layer::Wiring,
        Layer::Hazards,
        Layer::Markers,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMetadata {
    pub position_type: PositionType,
    pub ownership: TileOwnership,
    pub layer: Layer,
    pub has_channel: bool,
    pub has_rotation: bool,
    pub has_flip: bool,
    pub label: &'static str,
    pub image: &'static str,
}

const fn edge(label: &'static str, image: &'static str) -> EntityMetadata {
    EntityMetadata {
        position_type: PositionType::Edge,
        ownership: TileOwnership::OnlyEntityInTile,
        layer: Layer::Edges,
        has_channel: false,
        has_rotation: false,
        has_flip: false,
        label,
        image,
    }
}

const fn cell(label: &'static str, image: &'static str) -> EntityMetadata {
    EntityMetadata {
        position_type: PositionType::Cell,
        ownership: TileOwnership::OnlyEntityInTile,
        layer: Layer::Objects,
        has_channel: false,
        has_rotation: false,
        has_flip: false,
        label,
        image,
    }
}

const WALL: EntityMetadata = edge("Wall", "tiles/wall");
const CURTAIN: EntityMetadata = edge("Curtain", "tiles/curtain");
const ONE_WAY: EntityMetadata = EntityMetadata {
    has_flip: true,
    ..edge("One-way", "tiles/one_way")
};
const GLASS: EntityMetadata = edge("Glass", "tiles/glass");
const DOOR: EntityMetadata = EntityMetadata {
    has_channel: true,
    layer: Layer::Wiring,
    ..edge("Door", "tiles/door")
};
const STAFF: EntityMetadata = cell("Staff", "tiles/staff");
const SAUCE: EntityMetadata = cell("Sauce", "tiles/sauce");
const MUSHROOM_BLUE: EntityMetadata = cell("Blue mushroom", "tiles/mushroom_blue");
const MUSHROOM_GREEN: EntityMetadata = cell("Green mushroom", "tiles/mushroom_green");
const MUSHROOM_RED: EntityMetadata = cell("Red mushroom", "tiles/mushroom_red");
const BUTTON: EntityMetadata = EntityMetadata {
    has_channel: true,
    layer: Layer::Wiring,
    ..cell("Button", "tiles/button")
};
const WIRE: EntityMetadata = EntityMetadata {
    has_channel: true,
    layer: Layer::Wiring,
    ownership: TileOwnership::OnlyTypeInTile,
    ..cell("Wire", "tiles/wire")
};
const CLEANSING_POOL: EntityMetadata = cell("Cleansing pool", "tiles/cleansing_pool");
const EXIT: EntityMetadata = EntityMetadata {
    layer: Layer::Markers,
    ..cell("Exit", "tiles/exit")
};
const TIME_MACHINE: EntityMetadata = EntityMetadata {
    layer: Layer::Markers,
    has_rotation: true,
    ..cell("Time machine", "tiles/time_machine")
};
const EXPLOSION: EntityMetadata = EntityMetadata {
    layer: Layer::Hazards,
    has_rotation: true,
    ownership: TileOwnership::OnlyTypeInTile,
    ..cell("Explosion", "tiles/explosion")
};

pub fn metadata(entity_type: EntityType) -> &'static EntityMetadata {
    match entity_type {
        EntityType::Wall => &WALL,
        EntityType::Curtain => &CURTAIN,
        EntityType::OneWay => &ONE_WAY,
        EntityType::Glass => &GLASS,
        EntityType::Door => &DOOR,
        EntityType::Staff => &STAFF,
        EntityType::Sauce => &SAUCE,
        EntityType::MushroomBlue => &MUSHROOM_BLUE,
        EntityType::MushroomGreen => &MUSHROOM_GREEN,
        EntityType::MushroomRed => &MUSHROOM_RED,
        EntityType::Button => &BUTTON,
        EntityType::Wire => &WIRE,
        EntityType::CleansingPool => &CLEANSING_POOL,
        EntityType::Exit => &EXIT,
        EntityType::TimeMachine => &TIME_MACHINE,
        EntityType::Explosion => &EXPLOSION,
    }
}

const OVERLAPPABLE_PAIRS: [(EntityType, EntityType); 6] = [
    (EntityType::Wall, EntityType::Curtain),
    (EntityType::Curtain, EntityType::Door),
    (EntityType::Explosion, EntityType::TimeMachine),
    (EntityType::Explosion, EntityType::Exit),
    (EntityType::Wire, EntityType::Button),
    (EntityType::Wire, EntityType::Door),
];

/// Whether two entity types may share a slot regardless of ownership mode.
pub fn can_overlap(a: EntityType, b: EntityType) -> bool {
    OVERLAPPABLE_PAIRS
        .iter()
        .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
}
