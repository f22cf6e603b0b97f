use crate::collision::contact::ContactPoint;
use crate::geometry::{Geometry, Plane};
use crate::math::Vec3;

use super::{emit, Manifold, ShapePose};

fn world_normal(plane: &ShapePose) -> Vec3 {
    plane.rotation.rotate_vec(Plane::LOCAL_NORMAL)
}

/// Contacts for every world-space point below the plane.
fn plane_points(
    m: &mut Manifold,
    plane: &ShapePose,
    points: impl Iterator<Item = Vec3>,
    just_test: bool,
) -> bool {
    let normal = world_normal(plane);
    let mut hit = false;
    for point in points {
        let distance = (point - plane.position).dot(normal);
        if distance < 0.0 {
            hit = emit(
                m,
                just_test,
                ContactPoint::new(point - normal * distance, point, normal),
            );
            if just_test {
                return true;
            }
        }
    }
    hit
}

pub(super) fn plane_box(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    plane_convex(m, a, b, just_test)
}

pub(super) fn plane_convex(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let Some(hull) = b.geometry.hull() else {
        return false;
    };
    let vertices = hull
        .vertices()
        .iter()
        .map(|&v| b.rotation.rotate_vec(v) + b.position);
    plane_points(m, a, vertices, just_test)
}

pub(super) fn plane_particle(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    plane_points(m, a, std::iter::once(b.position), just_test)
}

pub(super) fn plane_trimesh(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let Geometry::Trimesh(mesh) = b.geometry else {
        return false;
    };
    let vertices = mesh
        .vertices()
        .iter()
        .map(|&v| b.rotation.rotate_vec(v) + b.position);
    plane_points(m, a, vertices, just_test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Shape, Trimesh};
    use crate::math::Quat;

    #[test]
    fn test_tilted_plane_particle() {
        let plane = Shape::plane();
        let particle = Shape::particle();
        // Plane normal rotated from +Y to +X
        let rotation = Quat::from_rotation_arc(Vec3::Y, Vec3::X);
        let a = ShapePose::new(plane.geometry(), Vec3::ZERO, rotation);
        let mut m = Manifold::new();

        let below = ShapePose::new(particle.geometry(), Vec3::new(-0.2, 5.0, 0.0), Quat::IDENTITY);
        assert!(plane_particle(&mut m, &a, &below, false));
        assert!(m.points[0].normal.almost_equals(Vec3::X, 1e-12));
        assert!((m.points[0].depth() - 0.2).abs() < 1e-12);

        let above = ShapePose::new(particle.geometry(), Vec3::new(0.2, 0.0, 0.0), Quat::IDENTITY);
        assert!(!plane_particle(&mut m, &a, &above, false));
    }

    #[test]
    fn test_trimesh_vertices_below_plane() {
        let plane = Shape::plane();
        let mesh = Shape::trimesh(
            Trimesh::new(
                vec![Vec3::new(0.0, -0.1, 0.0), Vec3::new(1.0, 0.2, 0.0), Vec3::new(0.0, -0.3, 1.0)],
                vec![0, 1, 2],
            )
            .unwrap(),
        );
        let mut m = Manifold::new();
        assert!(plane_trimesh(
            &mut m,
            &ShapePose::new(plane.geometry(), Vec3::ZERO, Quat::IDENTITY),
            &ShapePose::new(mesh.geometry(), Vec3::ZERO, Quat::IDENTITY),
            false,
        ));
        assert_eq!(m.points.len(), 2);
    }
}
