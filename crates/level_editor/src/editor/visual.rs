use std::any::Any;

use engine::{Color, Component, Rect, RenderContext, RenderQueue, Style, UpdateContext};
use glam::Vec2;

use crate::level::{metadata, EdgeAlignment, Entity, EntityType, PositionType, Slot};

/// Exponential smoothing rate of tile position and highlight, per second.
const TILE_SMOOTHING_RATE: f32 = 14.0;
const POSITION_SNAP_EPSILON: f32 = 1e-3;
const HIGHLIGHT_SNAP_EPSILON: f32 = 1e-2;
/// Thickness of edge tiles in world units.
const EDGE_THICKNESS: f32 = 0.16;
/// Edge pointer targets are fatter than the drawn edge.
const EDGE_HIT_THICKNESS: f32 = 0.34;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub grid_minor: Color,
    pub grid_major: Color,
    pub edge: Color,
    pub glass: Color,
    pub curtain: Color,
    pub door: Color,
    pub item: Color,
    pub wire: Color,
    pub hazard: Color,
    pub marker: Color,
    pub highlight: Color,
    pub invalid: Color,
}

const PALETTES: [Palette; 7] = [
    Palette {
        background: Color::rgb(24, 26, 32),
        grid_minor: Color::rgb(40, 44, 54),
        grid_major: Color::rgb(62, 68, 82),
        edge: Color::rgb(220, 220, 228),
        glass: Color::rgba(150, 210, 240, 160),
        curtain: Color::rgb(168, 60, 84),
        door: Color::rgb(224, 170, 60),
        item: Color::rgb(120, 200, 140),
        wire: Color::rgb(240, 220, 90),
        hazard: Color::rgb(240, 96, 48),
        marker: Color::rgb(110, 140, 255),
        highlight: Color::rgb(255, 255, 255),
        invalid: Color::rgb(230, 50, 50),
    },
    Palette {
        background: Color::rgb(246, 242, 232),
        grid_minor: Color::rgb(226, 220, 206),
        grid_major: Color::rgb(198, 188, 170),
        edge: Color::rgb(48, 44, 40),
        glass: Color::rgba(90, 150, 200, 150),
        curtain: Color::rgb(150, 40, 60),
        door: Color::rgb(190, 120, 30),
        item: Color::rgb(40, 140, 80),
        wire: Color::rgb(200, 160, 20),
        hazard: Color::rgb(210, 70, 30),
        marker: Color::rgb(60, 80, 200),
        highlight: Color::rgb(20, 20, 20),
        invalid: Color::rgb(200, 30, 30),
    },
    Palette {
        background: Color::rgb(12, 30, 24),
        grid_minor: Color::rgb(24, 50, 40),
        grid_major: Color::rgb(40, 80, 64),
        edge: Color::rgb(200, 240, 210),
        glass: Color::rgba(140, 230, 220, 150),
        curtain: Color::rgb(190, 90, 120),
        door: Color::rgb(240, 200, 90),
        item: Color::rgb(150, 230, 120),
        wire: Color::rgb(250, 240, 120),
        hazard: Color::rgb(255, 120, 70),
        marker: Color::rgb(120, 200, 255),
        highlight: Color::rgb(240, 255, 240),
        invalid: Color::rgb(240, 60, 60),
    },
    Palette {
        background: Color::rgb(30, 16, 36),
        grid_minor: Color::rgb(50, 30, 60),
        grid_major: Color::rgb(80, 50, 94),
        edge: Color::rgb(236, 210, 250),
        glass: Color::rgba(180, 170, 250, 150),
        curtain: Color::rgb(220, 80, 150),
        door: Color::rgb(250, 180, 90),
        item: Color::rgb(140, 220, 200),
        wire: Color::rgb(250, 230, 110),
        hazard: Color::rgb(255, 100, 90),
        marker: Color::rgb(150, 150, 255),
        highlight: Color::rgb(255, 240, 255),
        invalid: Color::rgb(255, 70, 70),
    },
    Palette {
        background: Color::rgb(14, 22, 44),
        grid_minor: Color::rgb(26, 38, 70),
        grid_major: Color::rgb(44, 62, 104),
        edge: Color::rgb(210, 225, 255),
        glass: Color::rgba(130, 200, 255, 150),
        curtain: Color::rgb(200, 80, 110),
        door: Color::rgb(250, 190, 80),
        item: Color::rgb(130, 220, 160),
        wire: Color::rgb(255, 230, 100),
        hazard: Color::rgb(255, 110, 60),
        marker: Color::rgb(255, 255, 140),
        highlight: Color::rgb(255, 255, 255),
        invalid: Color::rgb(255, 60, 60),
    },
    Palette {
        background: Color::rgb(40, 28, 18),
        grid_minor: Color::rgb(62, 46, 30),
        grid_major: Color::rgb(96, 72, 48),
        edge: Color::rgb(250, 230, 200),
        glass: Color::rgba(200, 220, 230, 150),
        curtain: Color::rgb(180, 60, 50),
        door: Color::rgb(240, 170, 60),
        item: Color::rgb(170, 210, 110),
        wire: Color::rgb(250, 220, 90),
        hazard: Color::rgb(255, 90, 40),
        marker: Color::rgb(120, 190, 250),
        highlight: Color::rgb(255, 250, 230),
        invalid: Color::rgb(255, 50, 50),
    },
    Palette {
        background: Color::rgb(0, 0, 0),
        grid_minor: Color::rgb(36, 36, 36),
        grid_major: Color::rgb(72, 72, 72),
        edge: Color::rgb(255, 255, 255),
        glass: Color::rgba(0, 255, 255, 160),
        curtain: Color::rgb(255, 0, 128),
        door: Color::rgb(255, 200, 0),
        item: Color::rgb(0, 255, 0),
        wire: Color::rgb(255, 255, 0),
        hazard: Color::rgb(255, 64, 0),
        marker: Color::rgb(0, 128, 255),
        highlight: Color::rgb(255, 255, 255),
        invalid: Color::rgb(255, 0, 0),
    },
];

/// Palette for a level's color selector; out-of-range values use the last palette.
pub fn palette(index: u8) -> &'static Palette {
    &PALETTES[(index as usize).min(PALETTES.len() - 1)]
}

/// Presentation variant of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileVariant {
    Normal,
    Entrance,
    Exit,
    Explosion,
}

impl TileVariant {
    pub fn for_entity(entity: &Entity) -> Self {
        match entity.entity_type() {
            EntityType::TimeMachine => TileVariant::Entrance,
            EntityType::Exit => TileVariant::Exit,
            EntityType::Explosion => TileVariant::Explosion,
            _ => TileVariant::Normal,
        }
    }
}

/// Bounds of an entity's tile in its own local space (centered on the slot).
pub fn tile_bounds(entity: &Entity, thickness: f32) -> Rect {
    match entity.slot() {
        Slot::Cell(_) => Rect::centered(Vec2::ZERO, Vec2::ONE),
        Slot::Edge(edge) => match edge.alignment {
            EdgeAlignment::Right => Rect::centered(Vec2::ZERO, Vec2::new(thickness, 1.0)),
            EdgeAlignment::Top => Rect::centered(Vec2::ZERO, Vec2::new(1.0, thickness)),
        },
    }
}

pub fn hit_bounds(entity: &Entity) -> Rect {
    tile_bounds(entity, EDGE_HIT_THICKNESS)
}

/// Draws one tile and animates it toward its slot.
#[derive(Debug, Clone)]
pub struct TileVisual {
    entity: Entity,
    variant: TileVariant,
    palette: u8,
    show_images: bool,
    target: Vec2,
    highlight: f32,
    highlight_target: f32,
}

impl TileVisual {
    pub fn new(entity: Entity, variant: TileVariant, palette: u8, show_images: bool) -> Self {
        Self {
            entity,
            variant,
            palette,
            show_images,
            target: entity.slot().world_center(),
            highlight: 0.0,
            highlight_target: 0.0,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn highlight(&self) -> f32 {
        self.highlight
    }

    pub fn set_entity(&mut self, entity: Entity) {
        self.entity = entity;
        self.variant = TileVariant::for_entity(&entity);
        self.target = entity.slot().world_center();
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn set_palette(&mut self, palette: u8) {
        self.palette = palette;
    }

    pub fn set_highlight_target(&mut self, highlight: f32) {
        self.highlight_target = highlight.clamp(0.0, 1.0);
    }

    /// Jumps straight to the target highlight.
    pub fn snap_highlight(&mut self, highlight: f32) {
        self.set_highlight_target(highlight);
        self.highlight = self.highlight_target;
    }

    fn base_color(&self, palette: &Palette) -> Color {
        match self.entity.entity_type() {
            EntityType::Wall => palette.edge,
            EntityType::Glass => palette.glass,
            EntityType::Curtain => palette.curtain,
            EntityType::Door => palette.door,
            EntityType::OneWay => palette.edge,
            EntityType::Wire | EntityType::Button => palette.wire,
            EntityType::Explosion => palette.hazard,
            EntityType::Exit | EntityType::TimeMachine => palette.marker,
            EntityType::MushroomBlue => Color::rgb(80, 130, 255),
            EntityType::MushroomGreen => Color::rgb(80, 210, 100),
            EntityType::MushroomRed => Color::rgb(235, 70, 70),
            EntityType::Staff | EntityType::Sauce | EntityType::CleansingPool => palette.item,
        }
    }

    fn queue_shape(&self, palette: &Palette, queue: &mut RenderQueue) {
        let color = self.base_color(palette);
        let cell = Rect::centered(Vec2::ZERO, Vec2::splat(0.8));
        match self.entity {
            Entity::Wall(_) | Entity::Glass(_) | Entity::Door(_) => {
                queue.rect(tile_bounds(&self.entity, EDGE_THICKNESS), Style::fill(color));
            }
            Entity::Curtain(_) => {
                queue.rect(
                    tile_bounds(&self.entity, EDGE_THICKNESS),
                    Style::fill(color.with_alpha(180)),
                );
            }
            Entity::OneWay(one_way) => {
                queue.rect(
                    tile_bounds(&self.entity, EDGE_THICKNESS * 0.5),
                    Style::fill(color),
                );
                let (dx, dy) = one_way.pass_direction().vector();
                let tip = Vec2::new(dx as f32, dy as f32) * 0.3;
                queue.line(-tip, tip, Style::stroke(palette.marker, 2.0));
            }
            Entity::Wire(_) => {
                queue.line(Vec2::new(-0.5, 0.0), Vec2::new(0.5, 0.0), Style::stroke(color, 3.0));
                queue.line(Vec2::new(0.0, -0.5), Vec2::new(0.0, 0.5), Style::stroke(color, 3.0));
            }
            Entity::Button(_) => {
                queue.rect(
                    Rect::centered(Vec2::ZERO, Vec2::splat(0.5)),
                    Style::fill(color).with_stroke(palette.edge),
                );
            }
            Entity::Staff(_) => {
                queue.line(Vec2::new(-0.3, -0.3), Vec2::new(0.3, 0.3), Style::stroke(color, 4.0));
            }
            Entity::CleansingPool(_) => {
                queue.rect(cell, Style::fill(palette.glass).with_stroke(color));
            }
            Entity::Sauce(_)
            | Entity::MushroomBlue(_)
            | Entity::MushroomGreen(_)
            | Entity::MushroomRed(_) => {
                queue.ellipse(Rect::centered(Vec2::ZERO, Vec2::splat(0.6)), Style::fill(color));
            }
            Entity::Exit(_) => {
                queue.rect(cell, Style::stroke(color, 3.0));
            }
            Entity::TimeMachine(machine) => {
                queue.rect(cell, Style::fill(color.with_alpha(120)).with_stroke(color));
                let (dx, dy) = machine.rotation.vector();
                queue.line(
                    Vec2::ZERO,
                    Vec2::new(dx as f32, dy as f32) * 0.4,
                    Style::stroke(palette.highlight, 2.0),
                );
            }
            Entity::Explosion(_) => {
                queue.ellipse(cell, Style::fill(color.with_alpha(170)));
            }
        }
    }
}

impl Component for TileVisual {
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> bool {
        let blend = 1.0 - (-TILE_SMOOTHING_RATE * ctx.frame.dt_seconds.max(0.0)).exp();
        let mut changed = false;

        let Some(current) = ctx.graph.transform(ctx.entity).map(|t| t.position()) else {
            return false;
        };
        if current != self.target {
            let next = if current.distance(self.target) <= POSITION_SNAP_EPSILON {
                self.target
            } else {
                current.lerp(self.target, blend)
            };
            changed |= ctx.graph.set_position(ctx.entity, next);
        }

        if self.highlight != self.highlight_target {
            let delta = self.highlight_target - self.highlight;
            self.highlight = if delta.abs() <= HIGHLIGHT_SNAP_EPSILON {
                self.highlight_target
            } else {
                self.highlight + delta * blend
            };
            changed = true;
        }
        changed
    }

    fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
        let palette = palette(self.palette);
        self.queue_shape(palette, queue);

        let meta = metadata(self.entity.entity_type());
        if self.show_images && meta.position_type == PositionType::Cell {
            queue.image(
                meta.image,
                Rect::centered(Vec2::ZERO, Vec2::ONE),
                Style::default(),
            );
        }

        if self.highlight > 0.0 {
            let bounds = tile_bounds(&self.entity, EDGE_HIT_THICKNESS);
            queue.rect(
                bounds,
                Style::stroke(palette.highlight, 2.0).with_opacity(self.highlight),
            );
        }
        if self.variant == TileVariant::Entrance || self.variant == TileVariant::Exit {
            queue.rect(
                Rect::centered(Vec2::ZERO, Vec2::splat(0.95)),
                Style::stroke(palette.marker, 1.0),
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Outline of the slot the brush would paint.
#[derive(Debug, Clone, Default)]
pub struct BrushPreview {
    preview: Option<(Entity, bool)>,
    palette: u8,
}

impl BrushPreview {
    pub fn preview(&self) -> Option<(Entity, bool)> {
        self.preview
    }

    /// Returns true when the preview changed.
    pub fn set_preview(&mut self, preview: Option<(Entity, bool)>) -> bool {
        if self.preview == preview {
            return false;
        }
        self.preview = preview;
        true
    }

    pub fn set_palette(&mut self, palette: u8) {
        self.palette = palette;
    }
}

impl Component for BrushPreview {
    fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
        let Some((entity, allowed)) = self.preview else {
            return;
        };
        let palette = palette(self.palette);
        let color = if allowed {
            palette.highlight
        } else {
            palette.invalid
        };
        let center = entity.slot().world_center();
        let bounds = tile_bounds(&entity, EDGE_HIT_THICKNESS);
        queue.rect(
            Rect::new(center.x + bounds.x, center.y + bounds.y, bounds.width, bounds.height),
            Style::stroke(color, 1.5).with_opacity(0.8),
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Rubber band of a box selection, in world units.
#[derive(Debug, Clone, Default)]
pub struct SelectionBox {
    corners: Option<(Vec2, Vec2)>,
    palette: u8,
}

impl SelectionBox {
    /// Returns true when the box changed.
    pub fn set_corners(&mut self, corners: Option<(Vec2, Vec2)>) -> bool {
        if self.corners == corners {
            return false;
        }
        self.corners = corners;
        true
    }

    pub fn set_palette(&mut self, palette: u8) {
        self.palette = palette;
    }
}

impl Component for SelectionBox {
    fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
        let Some((a, b)) = self.corners else {
            return;
        };
        let color = palette(self.palette).highlight;
        queue.rect(
            Rect::from_corners(a, b),
            Style::fill(color.with_alpha(40))
                .with_stroke(color)
                .with_line_width(1.0),
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
