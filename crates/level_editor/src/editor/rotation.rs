use glam::Vec2;

use crate::level::{EdgeAlignment, EdgePosition, Entity, OneWayEntity, Position, Rotation, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Clockwise,
    CounterClockwise,
}

impl Turn {
    fn apply(self, (x, y): (i32, i32)) -> (i32, i32) {
        match self {
            Turn::CounterClockwise => (-y, x),
            Turn::Clockwise => (y, -x),
        }
    }

    fn rotate(self, rotation: Rotation) -> Rotation {
        match self {
            Turn::CounterClockwise => rotation.rotated_ccw(),
            Turn::Clockwise => rotation.rotated_cw(),
        }
    }
}

/// Cell whose center is nearest the average slot center of `entities`.
pub fn pivot_cell<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Option<Position> {
    let mut sum = Vec2::ZERO;
    let mut count = 0usize;
    for entity in entities {
        sum += entity.slot().world_center();
        count += 1;
    }
    (count > 0).then(|| Position::containing(sum / count as f32))
}

/// Rotates `entity` a quarter turn about the center of `pivot`.
///
/// Works in doubled coordinates where cell centers and edge midpoints are integers, so an
/// edge always lands on an edge.
pub fn rotate_entity(entity: Entity, pivot: Position, turn: Turn) -> Entity {
    let center = (pivot.x * 2 + 1, pivot.y * 2 + 1);
    let rotate_point = |(x, y): (i32, i32)| {
        let (dx, dy) = turn.apply((x - center.0, y - center.1));
        (center.0 + dx, center.1 + dy)
    };

    let slot = match entity.slot() {
        Slot::Cell(cell) => {
            let (x, y) = rotate_point((cell.x * 2 + 1, cell.y * 2 + 1));
            Slot::Cell(Position::new((x - 1).div_euclid(2), (y - 1).div_euclid(2)))
        }
        Slot::Edge(edge) => {
            let (x, y) = rotate_point(edge.doubled());
            match EdgePosition::from_doubled(x, y) {
                Some(rotated) => Slot::Edge(rotated),
                None => Slot::Edge(edge),
            }
        }
    };

    let rotated = match entity {
        Entity::TimeMachine(mut machine) => {
            machine.rotation = turn.rotate(machine.rotation);
            Entity::TimeMachine(machine)
        }
        Entity::Explosion(mut explosion) => {
            explosion.direction = turn.rotate(explosion.direction);
            Entity::Explosion(explosion)
        }
        Entity::OneWay(one_way) => {
            let pass = turn.rotate(one_way.pass_direction());
            let alignment = match slot {
                Slot::Edge(edge) => edge.alignment,
                Slot::Cell(_) => one_way.edge_position.alignment,
            };
            Entity::OneWay(OneWayEntity {
                edge_position: one_way.edge_position,
                flip_direction: flip_for(alignment, pass),
            })
        }
        other => other,
    };
    rotated.with_slot(slot)
}

/// One-way with its pass direction reversed.
pub fn flip_one_way(entity: Entity) -> Entity {
    match entity {
        Entity::OneWay(mut one_way) => {
            one_way.flip_direction = !one_way.flip_direction;
            Entity::OneWay(one_way)
        }
        other => other,
    }
}

fn flip_for(alignment: EdgeAlignment, pass: Rotation) -> bool {
    matches!(
        (alignment, pass),
        (EdgeAlignment::Right, Rotation::Left) | (EdgeAlignment::Top, Rotation::Down)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{CellEntity, EdgeEntity, TimeMachineEntity};

    fn wall(edge: EdgePosition) -> Entity {
        Entity::Wall(EdgeEntity {
            edge_position: edge,
        })
    }

    #[test]
    fn edge_rotation_depends_on_direction() {
        let right = wall(EdgePosition::right(3, 4));
        let pivot = Position::new(3, 4);
        assert_eq!(
            rotate_entity(right, pivot, Turn::CounterClockwise).slot(),
            Slot::Edge(EdgePosition::top(3, 4))
        );
        assert_eq!(
            rotate_entity(right, pivot, Turn::Clockwise).slot(),
            Slot::Edge(EdgePosition::top(3, 3))
        );
    }

    #[test]
    fn four_turns_return_to_start() {
        let pivot = Position::new(-2, 5);
        for entity in [
            wall(EdgePosition::top(0, 1)),
            Entity::Staff(CellEntity {
                position: Position::new(4, -3),
            }),
        ] {
            let mut turned = entity;
            for _ in 0..4 {
                turned = rotate_entity(turned, pivot, Turn::Clockwise);
            }
            assert_eq!(turned, entity);
        }
    }

    #[test]
    fn cells_orbit_the_pivot() {
        let staff = Entity::Staff(CellEntity {
            position: Position::new(2, 0),
        });
        let turned = rotate_entity(staff, Position::new(0, 0), Turn::CounterClockwise);
        assert_eq!(turned.slot(), Slot::Cell(Position::new(0, 2)));
    }

    #[test]
    fn one_way_pass_direction_turns_with_edge() {
        let one_way = Entity::OneWay(OneWayEntity {
            edge_position: EdgePosition::right(0, 0),
            flip_direction: false,
        });
        let turned = rotate_entity(one_way, Position::new(0, 0), Turn::Clockwise);
        let Entity::OneWay(turned) = turned else {
            panic!("still a one-way");
        };
        assert_eq!(turned.edge_position, EdgePosition::top(0, -1));
        assert_eq!(turned.pass_direction(), Rotation::Down);
        assert!(turned.flip_direction);

        let flipped = flip_one_way(Entity::OneWay(turned));
        let Entity::OneWay(flipped) = flipped else {
            panic!("still a one-way");
        };
        assert_eq!(flipped.pass_direction(), Rotation::Up);
    }

    #[test]
    fn time_machine_facing_rotates() {
        let machine = Entity::TimeMachine(TimeMachineEntity {
            position: Position::new(1, 1),
            rotation: Rotation::Right,
        });
        let turned = rotate_entity(machine, Position::new(1, 1), Turn::CounterClockwise);
        assert_eq!(turned.rotation(), Some(Rotation::Up));
        assert_eq!(turned.slot(), Slot::Cell(Position::new(1, 1)));
    }

    #[test]
    fn pivot_is_cell_nearest_the_selection_center() {
        let a = Entity::Staff(CellEntity {
            position: Position::new(0, 0),
        });
        let b = Entity::Staff(CellEntity {
            position: Position::new(2, 2),
        });
        assert_eq!(pivot_cell([&a, &b]), Some(Position::new(1, 1)));
        assert_eq!(pivot_cell(std::iter::empty::<&Entity>()), None);
    }
}
