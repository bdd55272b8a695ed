use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::metadata::{
    COORDINATE_LIMIT, LEVEL_VERSION, MAX_COLOR_PALETTE, MAX_ENTITY_COUNT, MAX_EXPLOSION_SPEED,
    MAX_EXPLOSION_START_TIME, MAX_LEVEL_FILE_BYTES,
};
use super::types::{Entity, EntityType, Explosion, Position, Rotation, Slot, TimeMachineEntity};

/// On-disk shape of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelFile {
    pub version: u32,
    pub color_palette: u8,
    pub entrance: Entity,
    pub exit_position: Position,
    #[serde(default)]
    pub explosions: Vec<Explosion>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Default for LevelFile {
    fn default() -> Self {
        Self {
            version: LEVEL_VERSION,
            color_palette: 0,
            entrance: Entity::TimeMachine(TimeMachineEntity {
                position: Position::new(0, 0),
                rotation: Rotation::Right,
            }),
            exit_position: Position::new(4, 0),
            explosions: Vec::new(),
            entities: Vec::new(),
        }
    }
}

impl LevelFile {
    pub fn entity_count(&self) -> usize {
        self.entities.len() + self.explosions.len() + 2
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LevelValidationError {
    #[error("unsupported level version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
    #[error("color palette {found} out of range 0..={max}")]
    ColorPalette { found: u8, max: u8 },
    #[error("level has {count} entities, the limit is {max}")]
    TooManyEntities { count: usize, max: usize },
    #[error("entrance must be a TIME_MACHINE, found {found:?}")]
    EntranceType { found: EntityType },
    #[error("{path}: {entity_type:?} may not appear in the entity list")]
    ReservedType { path: String, entity_type: EntityType },
    #[error("{path}: position {position} is outside +/-{limit}")]
    OutOfBounds {
        path: String,
        position: Position,
        limit: i32,
    },
    #[error("{path}: {reason}")]
    Explosion { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LevelFileError {
    #[error("failed to read level '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("level '{path}' is {size} bytes, the limit is {max}")]
    TooLarge { path: PathBuf, size: u64, max: u64 },
    #[error("failed to parse level json at {json_path}: {source}")]
    Parse {
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid level: {0}")]
    Invalid(#[from] LevelValidationError),
    #[error("failed to encode level json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write level '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn in_bounds(position: Position) -> bool {
    position.x.abs() <= COORDINATE_LIMIT && position.y.abs() <= COORDINATE_LIMIT
}

pub fn validate_level(level: &LevelFile) -> Result<(), LevelValidationError> {
    if level.version != LEVEL_VERSION {
        return Err(LevelValidationError::Version {
            found: level.version,
            expected: LEVEL_VERSION,
        });
    }
    if level.color_palette > MAX_COLOR_PALETTE {
        return Err(LevelValidationError::ColorPalette {
            found: level.color_palette,
            max: MAX_COLOR_PALETTE,
        });
    }
    let count = level.entity_count();
    if count > MAX_ENTITY_COUNT {
        return Err(LevelValidationError::TooManyEntities {
            count,
            max: MAX_ENTITY_COUNT,
        });
    }
    if level.entrance.entity_type() != EntityType::TimeMachine {
        return Err(LevelValidationError::EntranceType {
            found: level.entrance.entity_type(),
        });
    }

    check_bounds("entrance", level.entrance.slot())?;
    check_bounds("exitPosition", Slot::Cell(level.exit_position))?;
    for (index, explosion) in level.explosions.iter().enumerate() {
        check_bounds(
            &format!("explosions[{index}].startPosition"),
            Slot::Cell(explosion.start_position),
        )?;
        check_explosion(index, explosion)?;
    }
    for (index, entity) in level.entities.iter().enumerate() {
        let path = format!("entities[{index}]");
        let entity_type = entity.entity_type();
        if matches!(
            entity_type,
            EntityType::Exit | EntityType::TimeMachine | EntityType::Explosion
        ) {
            return Err(LevelValidationError::ReservedType { path, entity_type });
        }
        check_bounds(&path, entity.slot())?;
    }
    Ok(())
}

fn check_explosion(index: usize, explosion: &Explosion) -> Result<(), LevelValidationError> {
    let speed = explosion.speed;
    if !(0.0..=MAX_EXPLOSION_SPEED).contains(&speed) {
        return Err(LevelValidationError::Explosion {
            path: format!("explosions[{index}].speed"),
            reason: format!("speed {speed} is outside 0..={MAX_EXPLOSION_SPEED}"),
        });
    }
    let start_time = explosion.start_time;
    if start_time.unsigned_abs() > MAX_EXPLOSION_START_TIME as u32 {
        return Err(LevelValidationError::Explosion {
            path: format!("explosions[{index}].startTime"),
            reason: format!("start time {start_time} is outside +/-{MAX_EXPLOSION_START_TIME}"),
        });
    }
    Ok(())
}

fn check_bounds(path: &str, slot: Slot) -> Result<(), LevelValidationError> {
    let position = slot.cell();
    if in_bounds(position) {
        Ok(())
    } else {
        Err(LevelValidationError::OutOfBounds {
            path: path.to_string(),
            position,
            limit: COORDINATE_LIMIT,
        })
    }
}

/// Parses and validates level json.
pub fn parse_level(raw: &str) -> Result<LevelFile, LevelFileError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let level = serde_path_to_error::deserialize::<_, LevelFile>(&mut deserializer).map_err(
        |error| {
            let json_path = error.path().to_string();
            LevelFileError::Parse {
                json_path,
                source: error.into_inner(),
            }
        },
    )?;
    validate_level(&level)?;
    Ok(level)
}

pub fn read_level(path: &Path) -> Result<LevelFile, LevelFileError> {
    let size = fs::metadata(path)
        .map_err(|source| LevelFileError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    if size > MAX_LEVEL_FILE_BYTES {
        return Err(LevelFileError::TooLarge {
            path: path.to_path_buf(),
            size,
            max: MAX_LEVEL_FILE_BYTES,
        });
    }
    let raw = fs::read_to_string(path).map_err(|source| LevelFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let level = parse_level(&raw)?;
    info!(
        path = %path.display(),
        entities = level.entity_count(),
        "level_read"
    );
    Ok(level)
}

pub fn level_to_json(level: &LevelFile) -> Result<String, LevelFileError> {
    serde_json::to_string_pretty(level).map_err(LevelFileError::Encode)
}

/// Writes pretty json through a sibling temp file so readers never see a partial level.
pub fn write_level(path: &Path, level: &LevelFile) -> Result<(), LevelFileError> {
    let json = level_to_json(level)?;
    write_text_atomic(path, &json).map_err(|source| LevelFileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;

    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }
    }
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("level.json");
    path.with_file_name(format!("{file_name}.tmp"))
}
