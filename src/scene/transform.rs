//! Transform component

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Per-entity position/rotation/scale with cached derived state.
///
/// The authoritative state is the (position, rotation, scale) triple; the two
/// direction matrices and the basis vectors are derived and recomputed by
/// every mutator before it returns. `local_to_parent * parent_to_local` is
/// always the identity (within float tolerance), and the basis vectors are
/// the columns of the current local-to-parent matrix.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,

    right: Vec3,
    up: Vec3,
    forward: Vec3,
    local_to_parent: Mat4,
    parent_to_local: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_components(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut transform = Self {
            position,
            rotation,
            scale,
            right: Vec3::X,
            up: Vec3::Y,
            forward: Vec3::Z,
            local_to_parent: Mat4::IDENTITY,
            parent_to_local: Mat4::IDENTITY,
        };
        transform.recompute();
        transform
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::from_components(position, Quat::IDENTITY, Vec3::ONE)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Local-to-parent matrix for the current (position, rotation, scale)
    pub fn local_to_parent(&self) -> Mat4 {
        self.local_to_parent
    }

    /// Parent-to-local matrix, inverse of [`Self::local_to_parent`]
    pub fn parent_to_local(&self) -> Mat4 {
        self.parent_to_local
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recompute();
    }

    pub fn add_position(&mut self, offset: Vec3) {
        self.position += offset;
        self.recompute();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.recompute();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.recompute();
    }

    /// Rotate by an axis/angle delta around the local origin
    pub fn rotate_axis(&mut self, axis: Vec3, angle_degrees: f32) {
        let delta = Quat::from_axis_angle(axis.normalize(), angle_degrees.to_radians());
        self.rotation = (delta * self.rotation).normalize();
        self.recompute();
    }

    /// Rotate around a pivot point: the offset from the pivot is rotated
    /// first, then the same delta is composed onto the rotation.
    pub fn rotate_around(&mut self, pivot: Vec3, axis: Vec3, angle_degrees: f32) {
        let delta = Quat::from_axis_angle(axis.normalize(), angle_degrees.to_radians());
        self.position = pivot + delta * (self.position - pivot);
        self.rotation = (delta * self.rotation).normalize();
        self.recompute();
    }

    /// Orient the transform so its forward axis points at `target`
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = up.cross(forward).normalize();
        let up = forward.cross(right);
        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, forward)).normalize();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.local_to_parent =
            Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position);
        self.parent_to_local = self.local_to_parent.inverse();
        self.right = self.local_to_parent.x_axis.truncate();
        self.up = self.local_to_parent.y_axis.truncate();
        self.forward = self.local_to_parent.z_axis.truncate();
    }
}

/// Transform uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniform {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl TransformUniform {
    /// Build uniform data from a resolved local-to-world matrix
    pub fn from_world(world: Mat4) -> Self {
        Self {
            model: world,
            normal_matrix: world.inverse().transpose(),
        }
    }
}
