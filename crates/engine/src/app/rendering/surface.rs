use glam::{Affine2, Vec2};

use super::commands::{Color, Rect};
use crate::app::images::Bitmap;

/// Immediate-mode 2D target the command executor draws into.
///
/// Geometry is given in the coordinate space set up by `transform` calls;
/// `line_width` is in that same space.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Color);
    fn save(&mut self);
    fn restore(&mut self);
    /// Post-multiplies the current matrix.
    fn transform(&mut self, matrix: Affine2);
    fn current_transform(&self) -> Affine2;
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32);
    fn fill_ellipse(&mut self, rect: Rect, color: Color);
    fn stroke_ellipse(&mut self, rect: Rect, color: Color, line_width: f32);
    fn line(&mut self, from: Vec2, to: Vec2, color: Color, line_width: f32);
    fn draw_image(&mut self, bitmap: &Bitmap, rect: Rect, opacity: f32);
}

#[derive(Debug, Clone)]
struct MatrixStack {
    current: Affine2,
    saved: Vec<Affine2>,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self {
            current: Affine2::IDENTITY,
            saved: Vec::new(),
        }
    }
}

impl MatrixStack {
    fn save(&mut self) {
        self.saved.push(self.current);
    }

    fn restore(&mut self) {
        if let Some(previous) = self.saved.pop() {
            self.current = previous;
        }
    }

    fn apply(&mut self, matrix: Affine2) {
        self.current = self.current * matrix;
    }
}

/// Software rasterizer over an RGBA8 frame (the `pixels` frame buffer).
pub struct PixelSurface<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
    stack: MatrixStack,
}

#[derive(Debug, Clone, Copy)]
struct ScreenBounds {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl<'a> PixelSurface<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
            stack: MatrixStack::default(),
        }
    }

    fn clip_bounds(&self, corners: &[Vec2]) -> Option<ScreenBounds> {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for corner in corners {
            min = min.min(*corner);
            max = max.max(*corner);
        }
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        let bounds = ScreenBounds {
            left: (min.x.floor() as i32).max(0),
            top: (min.y.floor() as i32).max(0),
            right: (max.x.ceil() as i32).min(self.width as i32),
            bottom: (max.y.ceil() as i32).min(self.height as i32),
        };
        (bounds.left < bounds.right && bounds.top < bounds.bottom).then_some(bounds)
    }

    fn rect_screen_corners(&self, rect: Rect) -> [Vec2; 4] {
        let m = self.stack.current;
        let min = rect.min();
        let max = rect.max();
        [
            m.transform_point2(min),
            m.transform_point2(Vec2::new(max.x, min.y)),
            m.transform_point2(max),
            m.transform_point2(Vec2::new(min.x, max.y)),
        ]
    }

    /// Visits every pixel in `rect`'s screen footprint with its center mapped
    /// back into local space.
    fn for_each_local_pixel(
        &mut self,
        rect: Rect,
        mut shade: impl FnMut(Vec2) -> Option<[u8; 4]>,
    ) {
        let m = self.stack.current;
        if m.matrix2.determinant().abs() <= f32::EPSILON {
            return;
        }
        let Some(bounds) = self.clip_bounds(&self.rect_screen_corners(rect)) else {
            return;
        };
        let inverse = m.inverse();
        for y in bounds.top..bounds.bottom {
            for x in bounds.left..bounds.right {
                let local = inverse.transform_point2(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                if let Some(color) = shade(local) {
                    blend_pixel(self.frame, self.width, x, y, color);
                }
            }
        }
    }

    fn fill_ellipse_band(&mut self, rect: Rect, color: Color, inner_shrink: Option<f32>) {
        let center = rect.center();
        let radii = Vec2::new(rect.width * 0.5, rect.height * 0.5);
        if radii.x <= 0.0 || radii.y <= 0.0 {
            return;
        }
        let outer = match inner_shrink {
            Some(half) => radii + Vec2::splat(half),
            None => radii,
        };
        let inner = inner_shrink.map(|half| radii - Vec2::splat(half));
        let bounds = Rect::centered(center, outer * 2.0);
        self.for_each_local_pixel(bounds, |local| {
            let d = local - center;
            if ellipse_value(d, outer) > 1.0 {
                return None;
            }
            if let Some(inner) = inner {
                if inner.x > 0.0 && inner.y > 0.0 && ellipse_value(d, inner) < 1.0 {
                    return None;
                }
            }
            Some(color.to_array())
        });
    }
}

fn ellipse_value(d: Vec2, radii: Vec2) -> f32 {
    (d.x / radii.x).powi(2) + (d.y / radii.y).powi(2)
}

impl DrawSurface for PixelSurface<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        let rgba = color.to_array();
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&rgba);
        }
    }

    fn save(&mut self) {
        self.stack.save();
    }

    fn restore(&mut self) {
        self.stack.restore();
    }

    fn transform(&mut self, matrix: Affine2) {
        self.stack.apply(matrix);
    }

    fn current_transform(&self) -> Affine2 {
        self.stack.current
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.for_each_local_pixel(rect, |local| {
            rect.contains(local).then_some(color.to_array())
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) {
        let half = line_width * 0.5;
        let outer = Rect::new(
            rect.x - half,
            rect.y - half,
            rect.width + line_width,
            rect.height + line_width,
        );
        let inner = Rect::new(
            rect.x + half,
            rect.y + half,
            rect.width - line_width,
            rect.height - line_width,
        );
        self.for_each_local_pixel(outer, |local| {
            let in_band = outer.contains(local)
                && !(inner.width > 0.0 && inner.height > 0.0 && inner.contains(local));
            in_band.then_some(color.to_array())
        });
    }

    fn fill_ellipse(&mut self, rect: Rect, color: Color) {
        self.fill_ellipse_band(rect, color, None);
    }

    fn stroke_ellipse(&mut self, rect: Rect, color: Color, line_width: f32) {
        self.fill_ellipse_band(rect, color, Some(line_width * 0.5));
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: Color, line_width: f32) {
        let m = self.stack.current;
        let a = m.transform_point2(from);
        let b = m.transform_point2(to);
        let scale = m.matrix2.determinant().abs().sqrt();
        let half = (line_width * scale * 0.5).max(0.5);
        let pad = Vec2::splat(half + 1.0);
        let Some(bounds) = self.clip_bounds(&[a - pad, b + pad, a + pad, b - pad]) else {
            return;
        };
        let segment = b - a;
        let length_sq = segment.length_squared();
        let rgba = color.to_array();
        for y in bounds.top..bounds.bottom {
            for x in bounds.left..bounds.right {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let t = if length_sq > 0.0 {
                    ((p - a).dot(segment) / length_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if p.distance(a + segment * t) <= half {
                    blend_pixel(self.frame, self.width, x, y, rgba);
                }
            }
        }
    }

    fn draw_image(&mut self, bitmap: &Bitmap, rect: Rect, opacity: f32) {
        if bitmap.width == 0 || bitmap.height == 0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return;
        }
        let expected_len = bitmap.width as usize * bitmap.height as usize * 4;
        if bitmap.rgba.len() < expected_len {
            return;
        }
        // With a y-up world the image's first row belongs at the top of `rect`.
        let flip_v = self.stack.current.matrix2.determinant() < 0.0;
        self.for_each_local_pixel(rect, |local| {
            if !rect.contains(local) {
                return None;
            }
            let u = (local.x - rect.x) / rect.width;
            let mut v = (local.y - rect.y) / rect.height;
            if flip_v {
                v = 1.0 - v;
            }
            let src_x = ((u * bitmap.width as f32) as u32).min(bitmap.width - 1) as usize;
            let src_y = ((v * bitmap.height as f32) as u32).min(bitmap.height - 1) as usize;
            let offset = (src_y * bitmap.width as usize + src_x) * 4;
            let alpha = (bitmap.rgba[offset + 3] as f32 * opacity).round() as u8;
            (alpha > 0).then(|| {
                [
                    bitmap.rgba[offset],
                    bitmap.rgba[offset + 1],
                    bitmap.rgba[offset + 2],
                    alpha,
                ]
            })
        });
    }
}

fn blend_pixel(frame: &mut [u8], width: u32, x: i32, y: i32, src: [u8; 4]) {
    if x < 0 || y < 0 || src[3] == 0 {
        return;
    }
    let Some(offset) = (y as usize)
        .checked_mul(width as usize)
        .and_then(|row| row.checked_add(x as usize))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    let Some(dst) = frame.get_mut(offset..offset + 4) else {
        return;
    };
    if src[3] == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    let alpha = src[3] as u32;
    for channel in 0..3 {
        let blended = (src[channel] as u32 * alpha + dst[channel] as u32 * (255 - alpha)) / 255;
        dst[channel] = blended as u8;
    }
    dst[3] = dst[3].max(src[3]);
}

/// One call observed by a [`RecordingSurface`], with the matrix active at the
/// time of the call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear(Color),
    FillRect {
        rect: Rect,
        color: Color,
        transform: Affine2,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        line_width: f32,
        transform: Affine2,
    },
    FillEllipse {
        rect: Rect,
        color: Color,
        transform: Affine2,
    },
    StrokeEllipse {
        rect: Rect,
        color: Color,
        line_width: f32,
        transform: Affine2,
    },
    Line {
        from: Vec2,
        to: Vec2,
        color: Color,
        line_width: f32,
        transform: Affine2,
    },
    Image {
        size: (u32, u32),
        rect: Rect,
        opacity: f32,
        transform: Affine2,
    },
}

/// Headless surface that records draw calls instead of rasterizing them.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    stack: MatrixStack,
    calls: Vec<DrawCall>,
    max_depth: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stack: MatrixStack::default(),
            calls: Vec::new(),
            max_depth: 0,
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    /// Saved matrices still outstanding; zero after a balanced frame.
    pub fn depth(&self) -> usize {
        self.stack.saved.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Color) {
        self.calls.push(DrawCall::Clear(color));
    }

    fn save(&mut self) {
        self.stack.save();
        self.max_depth = self.max_depth.max(self.stack.saved.len());
    }

    fn restore(&mut self) {
        self.stack.restore();
    }

    fn transform(&mut self, matrix: Affine2) {
        self.stack.apply(matrix);
    }

    fn current_transform(&self) -> Affine2 {
        self.stack.current
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::FillRect {
            rect,
            color,
            transform,
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::StrokeRect {
            rect,
            color,
            line_width,
            transform,
        });
    }

    fn fill_ellipse(&mut self, rect: Rect, color: Color) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::FillEllipse {
            rect,
            color,
            transform,
        });
    }

    fn stroke_ellipse(&mut self, rect: Rect, color: Color, line_width: f32) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::StrokeEllipse {
            rect,
            color,
            line_width,
            transform,
        });
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: Color, line_width: f32) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::Line {
            from,
            to,
            color,
            line_width,
            transform,
        });
    }

    fn draw_image(&mut self, bitmap: &Bitmap, rect: Rect, opacity: f32) {
        let transform = self.stack.current;
        self.calls.push(DrawCall::Image {
            size: (bitmap.width, bitmap.height),
            rect,
            opacity,
            transform,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    #[test]
    fn fill_rect_respects_current_transform() {
        let mut frame = vec![0u8; 8 * 8 * 4];
        let mut surface = PixelSurface::new(&mut frame, 8, 8);
        surface.transform(Affine2::from_translation(Vec2::new(4.0, 4.0)));
        surface.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
        drop(surface);

        assert_eq!(pixel(&frame, 8, 4, 4), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 8, 5, 5), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 8, 3, 3), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 8, 6, 6), [0, 0, 0, 0]);
    }

    #[test]
    fn drawing_outside_the_frame_is_clipped() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        let mut surface = PixelSurface::new(&mut frame, 4, 4);
        surface.fill_rect(Rect::new(-100.0, -100.0, 50.0, 50.0), Color::WHITE);
        surface.line(Vec2::new(-10.0, 2.0), Vec2::new(10.0, 2.0), Color::WHITE, 1.0);
        drop(surface);
        assert_eq!(pixel(&frame, 4, 0, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&frame, 4, 3, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn half_alpha_blends_over_existing_pixels() {
        let mut frame = vec![0u8; 4];
        let mut surface = PixelSurface::new(&mut frame, 1, 1);
        surface.clear(Color::BLACK);
        surface.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::rgba(255, 255, 255, 128));
        drop(surface);
        assert_eq!(frame[0], 128);
        assert_eq!(frame[3], 255);
    }

    #[test]
    fn recording_surface_tracks_save_restore_balance() {
        let mut surface = RecordingSurface::new(10, 10);
        surface.save();
        surface.transform(Affine2::from_translation(Vec2::ONE));
        surface.save();
        surface.restore();
        assert_eq!(surface.depth(), 1);
        surface.restore();
        assert_eq!(surface.depth(), 0);
        assert_eq!(surface.max_depth(), 2);
        assert_eq!(surface.current_transform(), Affine2::IDENTITY);
    }
}
