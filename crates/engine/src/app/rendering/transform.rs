use glam::{Affine2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Uniform scale factor of an affine matrix, `sqrt(|det|)`.
pub fn effective_scale(matrix: &Affine2) -> f32 {
    matrix.matrix2.determinant().abs().sqrt()
}

/// Converts a screen-pixel line width into the local units of `matrix`.
pub fn screen_width_to_local(line_width_px: f32, matrix: &Affine2) -> f32 {
    let scale = effective_scale(matrix);
    if scale <= f32::EPSILON {
        return line_width_px;
    }
    line_width_px / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Camera;

    #[test]
    fn origin_maps_to_viewport_center() {
        let viewport = Viewport::new(800, 600);
        let camera = Camera::default();
        let screen = camera.world_to_screen(Vec2::ZERO, viewport);
        assert_eq!(screen, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn camera_offset_shifts_screen_position() {
        let viewport = Viewport::new(800, 600);
        let mut camera = Camera::new(10.0, 0.1, 8.0);
        camera.set_position(Vec2::new(10.0, -5.0));
        let screen = camera.world_to_screen(Vec2::new(12.0, -4.0), viewport);
        assert!((screen - Vec2::new(420.0, 290.0)).length() < 1e-4);
    }

    #[test]
    fn line_width_is_divided_by_matrix_scale() {
        let matrix = Affine2::from_scale(Vec2::new(4.0, -4.0));
        assert_eq!(screen_width_to_local(2.0, &matrix), 0.5);
        assert_eq!(screen_width_to_local(2.0, &Affine2::ZERO), 2.0);
    }
}
