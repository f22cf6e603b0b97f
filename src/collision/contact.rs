use crate::math::Vec3;

/// A single contact point between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Deepest point of shape A inside B, world space
    pub point_a: Vec3,
    /// Deepest point of shape B inside A, world space
    pub point_b: Vec3,
    /// Contact normal (pointing from A to B)
    pub normal: Vec3,
}

impl ContactPoint {
    pub fn new(point_a: Vec3, point_b: Vec3, normal: Vec3) -> Self {
        Self {
            point_a,
            point_b,
            normal,
        }
    }

    /// Penetration depth along the normal (positive when overlapping)
    pub fn depth(&self) -> f64 {
        (self.point_a - self.point_b).dot(self.normal)
    }

    /// Returns the midpoint of the contact
    pub fn midpoint(&self) -> Vec3 {
        (self.point_a + self.point_b) * 0.5
    }

    /// The same contact seen from shape B.
    pub fn flipped(self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
        }
    }
}

/// Appends `contact` unless a contact with (almost) the same point on B is
/// already present.
pub(crate) fn push_unique(points: &mut Vec<ContactPoint>, contact: ContactPoint, tolerance: f64) {
    let tolerance_squared = tolerance * tolerance;
    let duplicate = points
        .iter()
        .any(|p| p.point_b.distance_squared(contact.point_b) < tolerance_squared);
    if !duplicate {
        points.push(contact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_and_flip() {
        let c = ContactPoint::new(Vec3::new(0.0, -0.1, 0.0), Vec3::ZERO, -Vec3::Y);
        assert!((c.depth() - 0.1).abs() < 1e-12);
        let f = c.flipped();
        assert_eq!(f.normal, Vec3::Y);
        assert!((f.depth() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_push_unique() {
        let mut points = Vec::new();
        push_unique(&mut points, ContactPoint::new(Vec3::ZERO, Vec3::X, Vec3::Y), 1e-6);
        push_unique(&mut points, ContactPoint::new(Vec3::ZERO, Vec3::X * (1.0 + 1e-9), Vec3::Y), 1e-6);
        push_unique(&mut points, ContactPoint::new(Vec3::ZERO, Vec3::Z, Vec3::Y), 1e-6);
        assert_eq!(points.len(), 2);
    }
}
