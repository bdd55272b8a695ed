mod document;
mod io;
mod metadata;
mod types;

pub use document::{LevelDocument, LevelEntity, TidGenerator};
pub use io::{
    in_bounds, level_to_json, parse_level, read_level, validate_level, write_level, LevelFile,
    LevelFileError, LevelValidationError,
};
pub use metadata::{
    can_overlap, metadata, EntityMetadata, Layer, PositionType, TileOwnership, COORDINATE_LIMIT,
    LEVEL_VERSION, MAX_COLOR_PALETTE, MAX_ENTITY_COUNT, MAX_EXPLOSION_SPEED,
    MAX_EXPLOSION_START_TIME, MAX_LEVEL_FILE_BYTES,
};
pub use types::{
    CellEntity, ChannelEntity, DoorEntity, EdgeAlignment, EdgeEntity, EdgePosition, Entity,
    EntityType, Explosion, OneWayEntity, Position, Rotation, Slot, Tid, TimeMachineEntity,
    MAX_WAVEFRONT_STEPS,
};
