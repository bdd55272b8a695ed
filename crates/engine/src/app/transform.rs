use std::cell::Cell;

use glam::{Affine2, Vec2};

/// Local position/rotation/scale of one scene-graph node.
///
/// Both matrices are cached. The local matrix is rebuilt on read after a
/// setter ran; the world matrix is owned by the scene graph, which composes it
/// with the parent's world matrix and clears `world_dirty`.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec2,
    rotation_degrees: f32,
    scale: Vec2,
    local: Cell<Affine2>,
    local_dirty: Cell<bool>,
    world: Cell<Affine2>,
    world_dirty: Cell<bool>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_degrees: 0.0,
            scale: Vec2::ONE,
            local: Cell::new(Affine2::IDENTITY),
            local_dirty: Cell::new(true),
            world: Cell::new(Affine2::IDENTITY),
            world_dirty: Cell::new(true),
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Returns true when the value actually changed.
    pub(crate) fn set_position(&mut self, position: Vec2) -> bool {
        if self.position == position {
            return false;
        }
        self.position = position;
        self.mark_local_dirty();
        true
    }

    pub(crate) fn set_rotation_degrees(&mut self, rotation_degrees: f32) -> bool {
        if self.rotation_degrees == rotation_degrees {
            return false;
        }
        self.rotation_degrees = rotation_degrees;
        self.mark_local_dirty();
        true
    }

    pub(crate) fn set_scale(&mut self, scale: Vec2) -> bool {
        if self.scale == scale {
            return false;
        }
        self.scale = scale;
        self.mark_local_dirty();
        true
    }

    /// translate · rotate · scale
    pub fn local_matrix(&self) -> Affine2 {
        if self.local_dirty.get() {
            self.local.set(Affine2::from_scale_angle_translation(
                self.scale,
                self.rotation_degrees.to_radians(),
                self.position,
            ));
            self.local_dirty.set(false);
        }
        self.local.get()
    }

    fn mark_local_dirty(&mut self) {
        self.local_dirty.set(true);
        self.world_dirty.set(true);
    }

    pub(crate) fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    pub(crate) fn mark_world_dirty(&self) {
        self.world_dirty.set(true);
    }

    pub(crate) fn cached_world(&self) -> Affine2 {
        self.world.get()
    }

    pub(crate) fn store_world(&self, world: Affine2) {
        self.world.set(world);
        self.world_dirty.set(false);
    }
}
