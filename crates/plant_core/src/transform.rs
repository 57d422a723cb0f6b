//! Transform state for decorative shape nodes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Local position, rotation and scale of a node hung on a branch anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// A transform collapsed to a point (scale zero), used for shapes that
    /// have not started growing.
    pub fn collapsed(position: Vec3) -> Self {
        Self {
            position,
            scale: Vec3::ZERO,
            ..Default::default()
        }
    }

    /// Create the model matrix for this transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Uniform scale, taken from the X component.
    pub fn uniform_scale(&self) -> f32 {
        self.scale.x
    }

    /// Set the same scale on all three axes.
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::splat(scale);
    }

    /// Forward direction (negative Z in right-handed coordinates).
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Up direction (positive Y).
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Rotate so that forward points along `direction`, keeping `up` as the
    /// roll reference. Degenerate inputs leave the rotation untouched.
    pub fn look_to(&mut self, direction: Vec3, up: Vec3) {
        if let Some(rotation) = look_rotation(direction, up) {
            self.rotation = rotation;
        }
    }

    /// Rotate so that forward points at `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.look_to(target - self.position, up);
    }
}

/// Rotation whose forward axis is `direction`. Falls back to another up
/// reference when `up` is parallel to `direction`.
pub fn look_rotation(direction: Vec3, up: Vec3) -> Option<Quat> {
    let forward = direction.normalize_or_zero();
    if forward == Vec3::ZERO {
        return None;
    }
    let mut up = up.normalize_or_zero();
    if up == Vec3::ZERO || forward.cross(up).length_squared() < 1e-8 {
        up = if forward.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    }
    Some(Quat::from_mat4(&Mat4::look_at_rh(Vec3::ZERO, forward, up)).inverse())
}

/// Raw transform data for upload to a render host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformRaw {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
}

impl From<&Transform> for TransformRaw {
    fn from(transform: &Transform) -> Self {
        Self {
            model: transform.to_matrix().to_cols_array_2d(),
        }
    }
}

impl From<Transform> for TransformRaw {
    fn from(transform: Transform) -> Self {
        Self::from(&transform)
    }
}
