use glam::{Affine2, Vec2};

use super::input::{InputSystem, PointerButton};
use super::rendering::Viewport;

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.1;
pub const CAMERA_ZOOM_MAX: f32 = 8.0;
pub const CAMERA_SCROLL_ZOOM_BASE: f32 = 1.1;
pub const DEFAULT_PIXELS_PER_UNIT: f32 = 32.0;

const SMOOTHING_RATE_PER_SECOND: f32 = 8.0;
const POSITION_EPSILON: f32 = 1e-3;
const ROTATION_EPSILON_DEGREES: f32 = 1e-2;
const ZOOM_EPSILON: f32 = 1e-4;
const POSITION_MIN_STEP: f32 = 1e-4;
const ROTATION_MIN_STEP_DEGREES: f32 = 1e-3;
const ZOOM_MIN_STEP: f32 = 1e-5;

/// Fly-to request; axes left `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CameraTarget {
    pub position: Option<Vec2>,
    pub rotation_degrees: Option<f32>,
    pub zoom: Option<f32>,
}

impl CameraTarget {
    pub fn position(position: Vec2) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_rotation_degrees(mut self, rotation_degrees: f32) -> Self {
        self.rotation_degrees = Some(rotation_degrees);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct PanDrag {
    start_screen: Vec2,
    start_position: Vec2,
}

#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec2,
    rotation_degrees: f32,
    zoom: f32,
    min_zoom: f32,
    max_zoom: f32,
    pixels_per_unit: f32,
    pan_button: Option<PointerButton>,
    scroll_zoom_enabled: bool,
    target: Option<CameraTarget>,
    pan: Option<PanDrag>,
    dirty: bool,
    version: u64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_degrees: 0.0,
            zoom: CAMERA_ZOOM_DEFAULT,
            min_zoom: CAMERA_ZOOM_MIN,
            max_zoom: CAMERA_ZOOM_MAX,
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            pan_button: Some(PointerButton::Middle),
            scroll_zoom_enabled: true,
            target: None,
            pan: None,
            dirty: true,
            version: 0,
        }
    }
}

impl Camera {
    pub fn new(pixels_per_unit: f32, min_zoom: f32, max_zoom: f32) -> Self {
        let (min_zoom, max_zoom) = if min_zoom <= max_zoom {
            (min_zoom, max_zoom)
        } else {
            (max_zoom, min_zoom)
        };
        Self {
            pixels_per_unit,
            min_zoom,
            max_zoom,
            zoom: CAMERA_ZOOM_DEFAULT.clamp(min_zoom, max_zoom),
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_bounds(&self) -> (f32, f32) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }

    pub fn target(&self) -> Option<CameraTarget> {
        self.target
    }

    pub fn is_flying(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every mutation; observers compare it between ticks.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn set_pan_button(&mut self, button: Option<PointerButton>) {
        self.pan_button = button;
        if button.is_none() {
            self.pan = None;
        }
    }

    pub fn set_scroll_zoom_enabled(&mut self, enabled: bool) {
        self.scroll_zoom_enabled = enabled;
    }

    pub fn set_position(&mut self, position: Vec2) {
        if self.position != position && position.is_finite() {
            self.position = position;
            self.touch();
        }
    }

    pub fn set_rotation_degrees(&mut self, rotation_degrees: f32) {
        if self.rotation_degrees != rotation_degrees && rotation_degrees.is_finite() {
            self.rotation_degrees = rotation_degrees;
            self.touch();
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = self.clamp_zoom(zoom);
        if self.zoom != zoom {
            self.zoom = zoom;
            self.touch();
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.position + delta);
    }

    /// Multiplies zoom by `factor` keeping the world point under `screen_point`
    /// fixed.
    pub fn zoom_at(&mut self, screen_point: Vec2, factor: f32, viewport: Viewport) {
        let anchor = self.screen_to_world(screen_point, viewport);
        self.set_zoom(self.zoom * factor);
        let drifted = self.screen_to_world(screen_point, viewport);
        self.translate(anchor - drifted);
    }

    pub fn fly_to(&mut self, target: CameraTarget) {
        let target = CameraTarget {
            zoom: target.zoom.map(|zoom| self.clamp_zoom(zoom)),
            ..target
        };
        self.target = Some(target);
        self.version = self.version.wrapping_add(1);
    }

    pub fn cancel_flight(&mut self) {
        self.target = None;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.version = self.version.wrapping_add(1);
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return CAMERA_ZOOM_DEFAULT.clamp(self.min_zoom, self.max_zoom);
        }
        zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// `T(viewport/2) · S(ppu·zoom, -ppu·zoom) · R(rotation) · T(-position)`
    pub fn world_to_screen_matrix(&self, viewport: Viewport) -> Affine2 {
        let scale = self.pixels_per_unit * self.zoom;
        Affine2::from_translation(viewport.center())
            * Affine2::from_scale(Vec2::new(scale, -scale))
            * Affine2::from_angle(self.rotation_degrees.to_radians())
            * Affine2::from_translation(-self.position)
    }

    pub fn screen_to_world_matrix(&self, viewport: Viewport) -> Affine2 {
        self.world_to_screen_matrix(viewport).inverse()
    }

    pub fn world_to_screen(&self, world: Vec2, viewport: Viewport) -> Vec2 {
        self.world_to_screen_matrix(viewport).transform_point2(world)
    }

    pub fn screen_to_world(&self, screen: Vec2, viewport: Viewport) -> Vec2 {
        self.screen_to_world_matrix(viewport).transform_point2(screen)
    }

    /// Applies pan drag, scroll zoom and fly-to smoothing. Returns whether the
    /// camera needs a re-render.
    pub fn update(&mut self, dt_seconds: f32, input: &mut InputSystem, viewport: Viewport) -> bool {
        self.update_pan(input, viewport);
        self.update_scroll_zoom(input, viewport);
        self.update_flight(dt_seconds);
        self.dirty
    }

    fn update_pan(&mut self, input: &InputSystem, viewport: Viewport) {
        let Some(button) = self.pan_button else {
            return;
        };
        let state = input.button(button);
        let pointer = input.pointer_screen();
        match (self.pan, pointer) {
            (None, Some(pointer)) if state.pressed() => {
                self.pan = Some(PanDrag {
                    start_screen: pointer,
                    start_position: self.position,
                });
                self.target = None;
            }
            (Some(drag), Some(pointer)) if state.down() => {
                let delta_screen = pointer - drag.start_screen;
                let linear = self.world_to_screen_matrix(viewport).matrix2.inverse();
                self.set_position(drag.start_position - linear * delta_screen);
            }
            (Some(_), _) if !state.down() => self.pan = None,
            _ => {}
        }
    }

    fn update_scroll_zoom(&mut self, input: &mut InputSystem, viewport: Viewport) {
        let delta = input.take_scroll();
        if !self.scroll_zoom_enabled || delta == 0.0 {
            return;
        }
        let factor = CAMERA_SCROLL_ZOOM_BASE.powf(delta);
        let anchor = input.pointer_screen().unwrap_or_else(|| viewport.center());
        self.target = None;
        self.zoom_at(anchor, factor, viewport);
    }

    fn update_flight(&mut self, dt_seconds: f32) {
        let Some(target) = self.target else {
            return;
        };
        let alpha = 1.0 - (-SMOOTHING_RATE_PER_SECOND * dt_seconds.max(0.0)).exp();
        let mut settled = true;

        if let Some(goal) = target.position {
            let (next, done) = approach_vec2(self.position, goal, alpha);
            settled &= done;
            self.set_position(next);
        }
        if let Some(goal) = target.rotation_degrees {
            let (next, done) = approach(
                self.rotation_degrees,
                goal,
                alpha,
                ROTATION_EPSILON_DEGREES,
                ROTATION_MIN_STEP_DEGREES,
            );
            settled &= done;
            self.set_rotation_degrees(next);
        }
        if let Some(goal) = target.zoom {
            let (next, done) = approach(self.zoom, goal, alpha, ZOOM_EPSILON, ZOOM_MIN_STEP);
            settled &= done;
            self.set_zoom(next);
        }

        if settled {
            self.target = None;
        }
    }
}

fn approach(current: f32, goal: f32, alpha: f32, epsilon: f32, min_step: f32) -> (f32, bool) {
    let diff = goal - current;
    if diff.abs() <= epsilon {
        return (goal, true);
    }
    let step = diff * alpha;
    if step.abs() < min_step {
        return (goal, true);
    }
    (current + step, false)
}

fn approach_vec2(current: Vec2, goal: Vec2, alpha: f32) -> (Vec2, bool) {
    let diff = goal - current;
    if diff.length() <= POSITION_EPSILON {
        return (goal, true);
    }
    let step = diff * alpha;
    if step.length() < POSITION_MIN_STEP {
        return (goal, true);
    }
    (current + step, false)
}
