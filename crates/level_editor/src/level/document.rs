use std::collections::BTreeMap;

use super::io::LevelFile;
use super::metadata::MAX_ENTITY_COUNT;
use super::types::{CellEntity, Entity, EntityType, Explosion, Position, Tid};

/// Hands out tIDs; never repeats within one editor.
#[derive(Debug, Default)]
pub struct TidGenerator {
    next: u64,
}

impl TidGenerator {
    pub fn next_tid(&mut self) -> Tid {
        self.next += 1;
        Tid(self.next)
    }
}

/// An entity together with its identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelEntity {
    pub tid: Tid,
    pub entity: Entity,
}

/// In-memory level the editor mutates.
///
/// Entities are kept ordered by tID, so re-inserting an entity with its
/// original id restores its original position in the list.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDocument {
    pub color_palette: u8,
    entrance: LevelEntity,
    exit: LevelEntity,
    explosions: BTreeMap<Tid, Explosion>,
    entities: BTreeMap<Tid, Entity>,
}

impl LevelDocument {
    pub fn from_file(file: &LevelFile, tids: &mut TidGenerator) -> Self {
        let entrance = LevelEntity {
            tid: tids.next_tid(),
            entity: file.entrance,
        };
        let exit = LevelEntity {
            tid: tids.next_tid(),
            entity: Entity::Exit(CellEntity {
                position: file.exit_position,
            }),
        };
        let explosions = file
            .explosions
            .iter()
            .map(|explosion| (tids.next_tid(), *explosion))
            .collect();
        let entities = file
            .entities
            .iter()
            .map(|entity| (tids.next_tid(), *entity))
            .collect();
        Self {
            color_palette: file.color_palette,
            entrance,
            exit,
            explosions,
            entities,
        }
    }

    pub fn to_file(&self) -> LevelFile {
        LevelFile {
            color_palette: self.color_palette,
            entrance: self.entrance.entity,
            exit_position: self.exit_position(),
            explosions: self.explosions.values().copied().collect(),
            entities: self.entities.values().copied().collect(),
            ..LevelFile::default()
        }
    }

    pub fn entrance(&self) -> LevelEntity {
        self.entrance
    }

    pub fn exit(&self) -> LevelEntity {
        self.exit
    }

    pub fn entrance_position(&self) -> Position {
        self.entrance.entity.slot().cell()
    }

    pub fn exit_position(&self) -> Position {
        self.exit.entity.slot().cell()
    }

    /// Entrance or exit cell, which no other cell entity may occupy.
    pub fn is_critical(&self, position: Position) -> bool {
        position == self.entrance_position() || position == self.exit_position()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len() + self.explosions.len() + 2
    }

    pub fn is_full(&self) -> bool {
        self.entity_count() >= MAX_ENTITY_COUNT
    }

    pub fn get(&self, tid: Tid) -> Option<Entity> {
        if tid == self.entrance.tid {
            return Some(self.entrance.entity);
        }
        if tid == self.exit.tid {
            return Some(self.exit.entity);
        }
        if let Some(explosion) = self.explosions.get(&tid) {
            return Some(Entity::Explosion(*explosion));
        }
        self.entities.get(&tid).copied()
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.get(tid).is_some()
    }

    /// Entrance, exit, explosions, then entities, each in tID order.
    pub fn iter(&self) -> impl Iterator<Item = LevelEntity> + '_ {
        [self.entrance, self.exit]
            .into_iter()
            .chain(self.explosions.iter().map(|(tid, explosion)| LevelEntity {
                tid: *tid,
                entity: Entity::Explosion(*explosion),
            }))
            .chain(
                self.entities
                    .iter()
                    .map(|(tid, entity)| LevelEntity { tid: *tid, entity: *entity }),
            )
    }

    /// Inserts or replaces an entity. A time machine becomes the entrance and an exit
    /// becomes the exit, taking over the given tID.
    pub fn upsert(&mut self, item: LevelEntity) {
        match item.entity {
            Entity::TimeMachine(_) => self.entrance = item,
            Entity::Exit(_) => self.exit = item,
            Entity::Explosion(explosion) => {
                self.entities.remove(&item.tid);
                self.explosions.insert(item.tid, explosion);
            }
            entity => {
                self.explosions.remove(&item.tid);
                self.entities.insert(item.tid, entity);
            }
        }
    }

    /// Removes an entity. The entrance and exit always stay and yield `None`.
    pub fn remove(&mut self, tid: Tid) -> Option<Entity> {
        if let Some(explosion) = self.explosions.remove(&tid) {
            return Some(Entity::Explosion(explosion));
        }
        self.entities.remove(&tid)
    }

    pub fn is_marker(&self, tid: Tid) -> bool {
        tid == self.entrance.tid || tid == self.exit.tid
    }

    pub fn count_of(&self, entity_type: EntityType) -> usize {
        self.iter()
            .filter(|item| item.entity.entity_type() == entity_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::types::{EdgeEntity, EdgePosition, Rotation};

    fn sample_file() -> LevelFile {
        let mut file = LevelFile::default();
        file.entities.push(Entity::Wall(EdgeEntity {
            edge_position: EdgePosition::right(1, 1),
        }));
        file.explosions.push(Explosion {
            direction: Rotation::Down,
            start_time: 0,
            start_position: Position::new(2, 2),
            speed: 1.0,
        });
        file
    }

    #[test]
    fn file_round_trips_through_document() {
        let file = sample_file();
        let mut tids = TidGenerator::default();
        let document = LevelDocument::from_file(&file, &mut tids);
        assert_eq!(document.entity_count(), 4);
        assert_eq!(document.to_file(), file);
        assert_eq!(document.iter().count(), 4);
    }

    #[test]
    fn reinserted_entity_keeps_its_place_in_order() {
        let mut file = sample_file();
        file.entities.push(Entity::Wall(EdgeEntity {
            edge_position: EdgePosition::top(5, 5),
        }));
        let mut tids = TidGenerator::default();
        let mut document = LevelDocument::from_file(&file, &mut tids);
        let first = document
            .iter()
            .find(|item| item.entity.entity_type() == EntityType::Wall)
            .expect("wall");

        let removed = document.remove(first.tid).expect("removed");
        document.upsert(LevelEntity {
            tid: first.tid,
            entity: removed,
        });
        assert_eq!(document.to_file(), file);
    }

    #[test]
    fn markers_cannot_be_removed() {
        let mut tids = TidGenerator::default();
        let mut document = LevelDocument::from_file(&LevelFile::default(), &mut tids);
        let entrance = document.entrance().tid;
        assert!(document.remove(entrance).is_none());
        assert!(document.is_critical(Position::new(0, 0)));
        assert!(document.is_critical(Position::new(4, 0)));
        assert!(document.is_marker(entrance));
    }
}
