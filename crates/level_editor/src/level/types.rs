use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::metadata::COORDINATE_LIMIT;

/// Integer grid cell. Cell `(x, y)` covers `[x, x + 1) x [y, y + 1)` in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shifted cell; saturates instead of wrapping at the i32 range.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }

    /// Cell containing a world point.
    pub fn containing(point: Vec2) -> Self {
        Self::new(point.x.floor() as i32, point.y.floor() as i32)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Discrete facing; degrees are counter-clockwise from +x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rotation {
    #[default]
    Right,
    Up,
    Left,
    Down,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::Right, Rotation::Up, Rotation::Left, Rotation::Down];

    pub const fn degrees(self) -> f32 {
        match self {
            Rotation::Right => 0.0,
            Rotation::Up => 90.0,
            Rotation::Left => 180.0,
            Rotation::Down => 270.0,
        }
    }

    pub const fn vector(self) -> (i32, i32) {
        match self {
            Rotation::Right => (1, 0),
            Rotation::Up => (0, 1),
            Rotation::Left => (-1, 0),
            Rotation::Down => (0, -1),
        }
    }

    pub fn from_vector(vector: (i32, i32)) -> Option<Self> {
        Self::ALL.into_iter().find(|rotation| rotation.vector() == vector)
    }

    pub const fn rotated_ccw(self) -> Self {
        match self {
            Rotation::Right => Rotation::Up,
            Rotation::Up => Rotation::Left,
            Rotation::Left => Rotation::Down,
            Rotation::Down => Rotation::Right,
        }
    }

    pub const fn rotated_cw(self) -> Self {
        match self {
            Rotation::Right => Rotation::Down,
            Rotation::Down => Rotation::Left,
            Rotation::Left => Rotation::Up,
            Rotation::Up => Rotation::Right,
        }
    }
}

/// Which of the two edges owned by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeAlignment {
    Right,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgePosition {
    pub cell: Position,
    pub alignment: EdgeAlignment,
}

impl EdgePosition {
    pub const fn new(cell: Position, alignment: EdgeAlignment) -> Self {
        Self { cell, alignment }
    }

    pub const fn right(x: i32, y: i32) -> Self {
        Self::new(Position::new(x, y), EdgeAlignment::Right)
    }

    pub const fn top(x: i32, y: i32) -> Self {
        Self::new(Position::new(x, y), EdgeAlignment::Top)
    }

    /// Midpoint of the edge in world units.
    pub fn midpoint(self) -> Vec2 {
        let (x, y) = self.doubled();
        Vec2::new(x as f32 * 0.5, y as f32 * 0.5)
    }

    /// Midpoint in doubled integer coordinates, where cell centers are odd/odd.
    pub const fn doubled(self) -> (i32, i32) {
        let (x, y) = (self.cell.x * 2, self.cell.y * 2);
        match self.alignment {
            EdgeAlignment::Right => (x + 2, y + 1),
            EdgeAlignment::Top => (x + 1, y + 2),
        }
    }

    /// Inverse of [`EdgePosition::doubled`]; `None` for points that are not edge midpoints.
    pub fn from_doubled(x: i32, y: i32) -> Option<Self> {
        match (x.rem_euclid(2), y.rem_euclid(2)) {
            (0, 1) => Some(Self::right((x - 2).div_euclid(2), (y - 1).div_euclid(2))),
            (1, 0) => Some(Self::top((x - 1).div_euclid(2), (y - 2).div_euclid(2))),
            _ => None,
        }
    }

    /// Edge nearest to a world point.
    pub fn nearest(point: Vec2) -> Self {
        let cell = Position::containing(point);
        let fx = point.x - cell.x as f32;
        let fy = point.y - cell.y as f32;
        let candidates = [
            (fx, Self::right(cell.x - 1, cell.y)),
            (1.0 - fx, Self::right(cell.x, cell.y)),
            (fy, Self::top(cell.x, cell.y - 1)),
            (1.0 - fy, Self::top(cell.x, cell.y)),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.0 < best.0 {
                best = *candidate;
            }
        }
        best.1
    }
}

/// Stable in-memory identity of a placed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tid(pub u64);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Wall,
    Curtain,
    OneWay,
    Glass,
    Door,
    Staff,
    Sauce,
    MushroomBlue,
    MushroomGreen,
    MushroomRed,
    Button,
    Wire,
    CleansingPool,
    Exit,
    TimeMachine,
    Explosion,
}

impl EntityType {
    pub const ALL: [EntityType; 16] = [
        EntityType::Wall,
        EntityType::Curtain,
        EntityType::OneWay,
        EntityType::Glass,
        EntityType::Door,
        EntityType::Staff,
        EntityType::Sauce,
        EntityType::MushroomBlue,
        EntityType::MushroomGreen,
        EntityType::MushroomRed,
        EntityType::Button,
        EntityType::Wire,
        EntityType::CleansingPool,
        EntityType::Exit,
        EntityType::TimeMachine,
        EntityType::Explosion,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEntity {
    pub edge_position: EdgePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneWayEntity {
    pub edge_position: EdgePosition,
    pub flip_direction: bool,
}

impl OneWayEntity {
    /// Direction a one-way lets things through, perpendicular to its edge.
    pub fn pass_direction(&self) -> Rotation {
        match (self.edge_position.alignment, self.flip_direction) {
            (EdgeAlignment::Right, false) => Rotation::Right,
            (EdgeAlignment::Right, true) => Rotation::Left,
            (EdgeAlignment::Top, false) => Rotation::Up,
            (EdgeAlignment::Top, true) => Rotation::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoorEntity {
    pub edge_position: EdgePosition,
    pub channel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEntity {
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntity {
    pub position: Position,
    pub channel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMachineEntity {
    pub position: Position,
    pub rotation: Rotation,
}

/// Furthest a wavefront is tracked from its start cell.
pub const MAX_WAVEFRONT_STEPS: i32 = 2 * COORDINATE_LIMIT;

/// Moving wavefront hazard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explosion {
    pub direction: Rotation,
    /// Frame the wavefront starts moving on.
    pub start_time: i32,
    pub start_position: Position,
    /// Cells per frame.
    pub speed: f32,
}

impl Explosion {
    /// Cell reached by the wavefront at `time`.
    ///
    /// Travel is capped at [`MAX_WAVEFRONT_STEPS`], which already carries any in-bounds start
    /// past the coordinate limit.
    pub fn position_at(&self, time: i32) -> Position {
        let elapsed = time.saturating_sub(self.start_time).max(0) as f32;
        let max = MAX_WAVEFRONT_STEPS as f32;
        // NaN casts to 0.
        let steps = (self.speed * elapsed).floor().clamp(-max, max) as i32;
        let (dx, dy) = self.direction.vector();
        self.start_position.offset(dx * steps, dy * steps)
    }
}

/// Where an entity sits on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Cell(Position),
    Edge(EdgePosition),
}

impl Slot {
    /// Anchor cell: the cell itself, or the cell owning the edge.
    pub const fn cell(self) -> Position {
        match self {
            Slot::Cell(position) => position,
            Slot::Edge(edge) => edge.cell,
        }
    }

    pub fn world_center(self) -> Vec2 {
        match self {
            Slot::Cell(position) => position.center(),
            Slot::Edge(edge) => edge.midpoint(),
        }
    }
}

/// A placeable level entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Entity {
    Wall(EdgeEntity),
    Curtain(EdgeEntity),
    OneWay(OneWayEntity),
    Glass(EdgeEntity),
    Door(DoorEntity),
    Staff(CellEntity),
    Sauce(CellEntity),
    MushroomBlue(CellEntity),
    MushroomGreen(CellEntity),
    MushroomRed(CellEntity),
    Button(ChannelEntity),
    Wire(ChannelEntity),
    CleansingPool(CellEntity),
    Exit(CellEntity),
    TimeMachine(TimeMachineEntity),
    Explosion(Explosion),
}

impl Entity {
    /// Builds a fresh entity of `entity_type` anchored at `cell`.
    ///
    /// Edge types use `alignment`; one-way uses `flip`; the time machine and explosions use
    /// `rotation`. Channels start at 0.
    pub fn create(
        entity_type: EntityType,
        cell: Position,
        alignment: EdgeAlignment,
        rotation: Rotation,
        flip: bool,
    ) -> Self {
        let edge_position = EdgePosition::new(cell, alignment);
        let at = CellEntity { position: cell };
        match entity_type {
            EntityType::Wall => Entity::Wall(EdgeEntity { edge_position }),
            EntityType::Curtain => Entity::Curtain(EdgeEntity { edge_position }),
            EntityType::OneWay => Entity::OneWay(OneWayEntity {
                edge_position,
                flip_direction: flip,
            }),
            EntityType::Glass => Entity::Glass(EdgeEntity { edge_position }),
            EntityType::Door => Entity::Door(DoorEntity {
                edge_position,
                channel: 0,
            }),
            EntityType::Staff => Entity::Staff(at),
            EntityType::Sauce => Entity::Sauce(at),
            EntityType::MushroomBlue => Entity::MushroomBlue(at),
            EntityType::MushroomGreen => Entity::MushroomGreen(at),
            EntityType::MushroomRed => Entity::MushroomRed(at),
            EntityType::Button => Entity::Button(ChannelEntity {
                position: cell,
                channel: 0,
            }),
            EntityType::Wire => Entity::Wire(ChannelEntity {
                position: cell,
                channel: 0,
            }),
            EntityType::CleansingPool => Entity::CleansingPool(at),
            EntityType::Exit => Entity::Exit(at),
            EntityType::TimeMachine => Entity::TimeMachine(TimeMachineEntity {
                position: cell,
                rotation,
            }),
            EntityType::Explosion => Entity::Explosion(Explosion {
                direction: rotation,
                start_time: 0,
                start_position: cell,
                speed: 1.0,
            }),
        }
    }

    pub const fn entity_type(&self) -> EntityType {
        match self {
            Entity::Wall(_) => EntityType::Wall,
            Entity::Curtain(_) => EntityType::Curtain,
            Entity::OneWay(_) => EntityType::OneWay,
            Entity::Glass(_) => EntityType::Glass,
            Entity::Door(_) => EntityType::Door,
            Entity::Staff(_) => EntityType::Staff,
            Entity::Sauce(_) => EntityType::Sauce,
            Entity::MushroomBlue(_) => EntityType::MushroomBlue,
            Entity::MushroomGreen(_) => EntityType::MushroomGreen,
            Entity::MushroomRed(_) => EntityType::MushroomRed,
            Entity::Button(_) => EntityType::Button,
            Entity::Wire(_) => EntityType::Wire,
            Entity::CleansingPool(_) => EntityType::CleansingPool,
            Entity::Exit(_) => EntityType::Exit,
            Entity::TimeMachine(_) => EntityType::TimeMachine,
            Entity::Explosion(_) => EntityType::Explosion,
        }
    }

    /// Grid slot used for ownership; explosions own the cell they start from.
    pub const fn slot(&self) -> Slot {
        match self {
            Entity::Wall(e) | Entity::Curtain(e) | Entity::Glass(e) => Slot::Edge(e.edge_position),
            Entity::OneWay(e) => Slot::Edge(e.edge_position),
            Entity::Door(e) => Slot::Edge(e.edge_position),
            Entity::Staff(e)
            | Entity::Sauce(e)
            | Entity::MushroomBlue(e)
            | Entity::MushroomGreen(e)
            | Entity::MushroomRed(e)
            | Entity::CleansingPool(e)
            | Entity::Exit(e) => Slot::Cell(e.position),
            Entity::Button(e) | Entity::Wire(e) => Slot::Cell(e.position),
            Entity::TimeMachine(e) => Slot::Cell(e.position),
            Entity::Explosion(e) => Slot::Cell(e.start_position),
        }
    }

    /// Same entity moved onto `slot`. Slot kinds that do not match the entity are ignored.
    pub fn with_slot(mut self, slot: Slot) -> Self {
        match (&mut self, slot) {
            (Entity::Wall(e) | Entity::Curtain(e) | Entity::Glass(e), Slot::Edge(edge)) => {
                e.edge_position = edge
            }
            (Entity::OneWay(e), Slot::Edge(edge)) => e.edge_position = edge,
            (Entity::Door(e), Slot::Edge(edge)) => e.edge_position = edge,
            (
                Entity::Staff(e)
                | Entity::Sauce(e)
                | Entity::MushroomBlue(e)
                | Entity::MushroomGreen(e)
                | Entity::MushroomRed(e)
                | Entity::CleansingPool(e)
                | Entity::Exit(e),
                Slot::Cell(cell),
            ) => e.position = cell,
            (Entity::Button(e) | Entity::Wire(e), Slot::Cell(cell)) => e.position = cell,
            (Entity::TimeMachine(e), Slot::Cell(cell)) => e.position = cell,
            (Entity::Explosion(e), Slot::Cell(cell)) => e.start_position = cell,
            _ => {}
        }
        self
    }

    /// Same entity shifted by whole cells.
    pub fn translated(self, dx: i32, dy: i32) -> Self {
        let slot = match self.slot() {
            Slot::Cell(cell) => Slot::Cell(cell.offset(dx, dy)),
            Slot::Edge(edge) => Slot::Edge(EdgePosition::new(edge.cell.offset(dx, dy), edge.alignment)),
        };
        self.with_slot(slot)
    }

    pub const fn rotation(&self) -> Option<Rotation> {
        match self {
            Entity::TimeMachine(e) => Some(e.rotation),
            Entity::Explosion(e) => Some(e.direction),
            _ => None,
        }
    }

    pub const fn channel(&self) -> Option<i32> {
        match self {
            Entity::Door(e) => Some(e.channel),
            Entity::Button(e) | Entity::Wire(e) => Some(e.channel),
            _ => None,
        }
    }

    pub fn with_channel(mut self, channel: i32) -> Self {
        match &mut self {
            Entity::Door(e) => e.channel = channel,
            Entity::Button(e) | Entity::Wire(e) => e.channel = channel,
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubled_edge_coordinates_round_trip_for_negative_cells() {
        for edge in [
            EdgePosition::right(-3, -1),
            EdgePosition::top(-1, -4),
            EdgePosition::right(2, 0),
        ] {
            let (x, y) = edge.doubled();
            assert_eq!(EdgePosition::from_doubled(x, y), Some(edge));
        }
        assert_eq!(EdgePosition::from_doubled(1, 1), None);
    }

    #[test]
    fn nearest_edge_picks_closest_side_of_cell() {
        assert_eq!(EdgePosition::nearest(Vec2::new(3.9, 4.5)), EdgePosition::right(3, 4));
        assert_eq!(EdgePosition::nearest(Vec2::new(3.1, 4.5)), EdgePosition::right(2, 4));
        assert_eq!(EdgePosition::nearest(Vec2::new(3.5, 4.95)), EdgePosition::top(3, 4));
        assert_eq!(EdgePosition::nearest(Vec2::new(3.5, 4.05)), EdgePosition::top(3, 3));
    }

    #[test]
    fn entities_serialize_with_entity_type_tag() {
        let wall = Entity::create(
            EntityType::Wall,
            Position::new(3, 4),
            EdgeAlignment::Right,
            Rotation::Right,
            false,
        );
        let json = serde_json::to_value(wall).expect("serialize wall");
        assert_eq!(
            json,
            serde_json::json!({
                "entityType": "WALL",
                "edgePosition": { "cell": { "x": 3, "y": 4 }, "alignment": "RIGHT" }
            })
        );

        let parsed: Entity = serde_json::from_value(serde_json::json!({
            "entityType": "ONE_WAY",
            "edgePosition": { "cell": { "x": 0, "y": 1 }, "alignment": "TOP" },
            "flipDirection": true
        }))
        .expect("parse one-way");
        assert_eq!(parsed.entity_type(), EntityType::OneWay);
        assert_eq!(parsed.slot(), Slot::Edge(EdgePosition::top(0, 1)));
    }

    #[test]
    fn explosion_wavefront_advances_whole_cells() {
        let explosion = Explosion {
            direction: Rotation::Up,
            start_time: 2,
            start_position: Position::new(1, 1),
            speed: 0.5,
        };
        assert_eq!(explosion.position_at(0), Position::new(1, 1));
        assert_eq!(explosion.position_at(3), Position::new(1, 1));
        assert_eq!(explosion.position_at(6), Position::new(1, 3));
    }

    #[test]
    fn extreme_explosion_descriptors_stay_finite() {
        let runaway = Explosion {
            direction: Rotation::Right,
            start_time: -1,
            start_position: Position::new(5, 5),
            speed: 1e10,
        };
        assert_eq!(
            runaway.position_at(0),
            Position::new(5 + MAX_WAVEFRONT_STEPS, 5)
        );
        assert_eq!(
            runaway.position_at(i32::MAX),
            Position::new(5 + MAX_WAVEFRONT_STEPS, 5)
        );

        let ancient = Explosion {
            start_time: i32::MIN,
            direction: Rotation::Left,
            ..runaway
        };
        assert_eq!(
            ancient.position_at(i32::MAX),
            Position::new(5 - MAX_WAVEFRONT_STEPS, 5)
        );

        let stalled = Explosion {
            speed: f32::NAN,
            ..runaway
        };
        assert_eq!(stalled.position_at(100), Position::new(5, 5));
        assert_eq!(
            Position::new(i32::MAX, i32::MIN).offset(1, -1),
            Position::new(i32::MAX, i32::MIN)
        );
    }

    #[test]
    fn translated_keeps_edge_alignment() {
        let door = Entity::create(
            EntityType::Door,
            Position::new(0, 0),
            EdgeAlignment::Top,
            Rotation::Right,
            false,
        )
        .with_channel(7);
        let moved = door.translated(2, -1);
        assert_eq!(moved.slot(), Slot::Edge(EdgePosition::top(2, -1)));
        assert_eq!(moved.channel(), Some(7));
    }
}
