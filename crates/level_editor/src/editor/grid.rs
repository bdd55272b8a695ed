use std::any::Any;

use engine::{Camera, Component, Rect, RenderContext, RenderQueue, Style, Viewport};
use glam::Vec2;

use super::visual::palette;

/// Every n-th line is drawn in the major color.
pub const MAJOR_LINE_EVERY: i32 = 8;
/// Minor lines are dropped once cells shrink below this many pixels.
const MIN_MINOR_CELL_PX: f32 = 6.0;
/// Guards against runaway line counts at extreme zoom.
const MAX_LINES_PER_AXIS: i32 = 512;

/// Background fill and grid lines for the visible part of the world.
#[derive(Debug, Clone, Default)]
pub struct GridBackground {
    palette: u8,
}

impl GridBackground {
    pub fn new(palette: u8) -> Self {
        Self { palette }
    }

    pub fn set_palette(&mut self, palette: u8) {
        self.palette = palette;
    }
}

/// World-space rectangle covered by the viewport, grown to whole cells.
pub fn visible_cells(camera: &Camera, viewport: Viewport) -> Rect {
    let (w, h) = (viewport.width as f32, viewport.height as f32);
    let corners = [
        Vec2::ZERO,
        Vec2::new(w, 0.0),
        Vec2::new(0.0, h),
        Vec2::new(w, h),
    ]
    .map(|corner| camera.screen_to_world(corner, viewport));
    let min = corners.iter().copied().fold(Vec2::splat(f32::MAX), Vec2::min);
    let max = corners.iter().copied().fold(Vec2::splat(f32::MIN), Vec2::max);
    Rect::from_corners(min.floor(), max.ceil())
}

impl Component for GridBackground {
    fn queue_render_commands(&self, ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
        if ctx.viewport.is_empty() {
            return;
        }
        let palette = palette(self.palette);
        let area = visible_cells(ctx.camera, ctx.viewport);
        queue.rect(area, Style::fill(palette.background));

        let cell_px = ctx.camera.pixels_per_unit() * ctx.camera.zoom();
        let minor = cell_px >= MIN_MINOR_CELL_PX;
        let (min, max) = (area.min(), area.max());
        let (x0, x1) = (min.x as i32, max.x as i32);
        let (y0, y1) = (min.y as i32, max.y as i32);
        if x1 - x0 > MAX_LINES_PER_AXIS * MAJOR_LINE_EVERY || y1 - y0 > MAX_LINES_PER_AXIS * MAJOR_LINE_EVERY {
            return;
        }

        for x in x0..=x1 {
            let major = x.rem_euclid(MAJOR_LINE_EVERY) == 0;
            if !major && !minor {
                continue;
            }
            let color = if major { palette.grid_major } else { palette.grid_minor };
            queue.line(
                Vec2::new(x as f32, min.y),
                Vec2::new(x as f32, max.y),
                Style::stroke(color, 1.0),
            );
        }
        for y in y0..=y1 {
            let major = y.rem_euclid(MAJOR_LINE_EVERY) == 0;
            if !major && !minor {
                continue;
            }
            let color = if major { palette.grid_major } else { palette.grid_minor };
            queue.line(
                Vec2::new(min.x, y as f32),
                Vec2::new(max.x, y as f32),
                Style::stroke(color, 1.0),
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
