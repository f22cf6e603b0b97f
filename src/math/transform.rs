use serde::{Deserialize, Serialize};

use super::mat3::Mat3;
use super::quat::Quat;
use super::vec3::Vec3;

/// A rigid frame: position plus orientation.
///
/// Shapes are posed relative to their body with one of these, and bodies are
/// posed relative to the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    #[inline]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[inline]
    pub fn rotation_matrix(self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }

    /// Transforms a point from local space to world space
    #[inline]
    pub fn transform_point(self, point: Vec3) -> Vec3 {
        self.rotation.rotate_vec(point) + self.position
    }

    /// Transforms a direction; translation does not apply.
    #[inline]
    pub fn transform_vector(self, vector: Vec3) -> Vec3 {
        self.rotation.rotate_vec(vector)
    }

    #[inline]
    pub fn inverse_transform_point(self, point: Vec3) -> Vec3 {
        self.rotation.inverse_rotate_vec(point - self.position)
    }

    #[inline]
    pub fn inverse_transform_vector(self, vector: Vec3) -> Vec3 {
        self.rotation.inverse_rotate_vec(vector)
    }

    /// `self * other`: maps from `other`'s local space through `self` to world.
    #[inline]
    pub fn compose(self, other: Self) -> Self {
        Self {
            position: self.transform_point(other.position),
            rotation: self.rotation * other.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_round_trip() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(Vec3::Y, 0.8),
        );
        let p = Vec3::new(-0.4, 0.5, 2.0);
        let back = t.inverse_transform_point(t.transform_point(p));
        assert!(back.almost_equals(p, 1e-12));
    }

    #[test]
    fn test_compose() {
        let body = Transform::new(Vec3::new(0.0, 1.0, 0.0), Quat::from_axis_angle(Vec3::Z, 0.5));
        let offset = Transform::from_position(Vec3::new(2.0, 0.0, 0.0));
        let composed = body.compose(offset);
        let p = Vec3::new(0.1, 0.2, 0.3);
        assert!(composed
            .transform_point(p)
            .almost_equals(body.transform_point(offset.transform_point(p)), 1e-12));
    }
}
