use crate::collision::contact::ContactPoint;
use crate::geometry::{ConvexPolyhedron, Geometry, Plane};
use crate::math::{Quat, Vec3};

use super::{emit, Manifold, ShapePose};

fn radius_of(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Sphere(s) => s.radius,
        _ => 0.0,
    }
}

pub(super) fn sphere_sphere(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let (ra, rb) = (radius_of(a.geometry), radius_of(b.geometry));
    let d = b.position - a.position;
    if d.length_squared() >= (ra + rb) * (ra + rb) {
        return false;
    }

    // Concentric spheres get an arbitrary but fixed normal
    let n = d.try_normalize().unwrap_or(Vec3::Y);
    emit(
        m,
        just_test,
        ContactPoint::new(a.position + n * ra, b.position - n * rb, n),
    )
}

pub(super) fn sphere_plane(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let r = radius_of(a.geometry);
    let normal = b.rotation.rotate_vec(Plane::LOCAL_NORMAL);
    let distance = (a.position - b.position).dot(normal);
    if distance >= r {
        return false;
    }

    emit(
        m,
        just_test,
        ContactPoint::new(a.position - normal * r, a.position - normal * distance, -normal),
    )
}

pub(super) fn sphere_box(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    match b.geometry {
        Geometry::Box(cuboid) => sphere_hull(
            m,
            a.position,
            radius_of(a.geometry),
            cuboid.hull(),
            b.position,
            b.rotation,
            just_test,
        ),
        _ => false,
    }
}

pub(super) fn sphere_convex(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    match b.geometry.hull() {
        Some(hull) => sphere_hull(
            m,
            a.position,
            radius_of(a.geometry),
            hull,
            b.position,
            b.rotation,
            just_test,
        ),
        None => false,
    }
}

pub(super) fn sphere_particle(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let r = radius_of(a.geometry);
    let d = b.position - a.position;
    if d.length_squared() >= r * r {
        return false;
    }

    let n = d.try_normalize().unwrap_or(Vec3::Y);
    emit(m, just_test, ContactPoint::new(a.position + n * r, b.position, n))
}

/// Sphere of `radius` at world `center` against a posed hull.
///
/// Outside the hull the contact follows the closest surface point; a centre
/// inside the hull is pushed out through the face of least penetration.
pub(super) fn sphere_hull(
    m: &mut Manifold,
    center: Vec3,
    radius: f64,
    hull: &ConvexPolyhedron,
    position: Vec3,
    rotation: Quat,
    just_test: bool,
) -> bool {
    let local_center = rotation.inverse_rotate_vec(center - position);
    let vertices = hull.vertices();

    let mut deepest_face = 0;
    let mut max_distance = f64::NEG_INFINITY;
    let mut closest: Option<(f64, Vec3)> = None;

    for (index, (face, &normal)) in hull.faces().iter().zip(hull.face_normals()).enumerate() {
        let distance = normal.dot(local_center - vertices[face[0]]);
        if distance > max_distance {
            max_distance = distance;
            deepest_face = index;
        }
        if distance <= 0.0 || distance >= radius {
            continue;
        }

        // Face visible from the centre and within reach
        let projected = local_center - normal * distance;
        let candidate = if hull.face_contains(index, projected) {
            projected
        } else {
            closest_on_face_edges(vertices, face, local_center)
        };
        let candidate_distance = candidate.distance_squared(local_center);
        if closest.map_or(true, |(best, _)| candidate_distance < best) {
            closest = Some((candidate_distance, candidate));
        }
    }

    if max_distance <= 0.0 {
        // Centre inside the hull
        let normal = hull.face_normals()[deepest_face];
        let world_normal = rotation.rotate_vec(normal);
        let on_face = rotation.rotate_vec(local_center - normal * max_distance) + position;
        return emit(
            m,
            just_test,
            ContactPoint::new(center - world_normal * radius, on_face, -world_normal),
        );
    }

    let Some((distance_squared, point)) = closest else {
        return false;
    };
    if distance_squared >= radius * radius {
        return false;
    }

    let world_point = rotation.rotate_vec(point) + position;
    let Some(n) = (world_point - center).try_normalize() else {
        return false;
    };
    emit(m, just_test, ContactPoint::new(center + n * radius, world_point, n))
}

fn closest_on_face_edges(vertices: &[Vec3], face: &[usize], point: Vec3) -> Vec3 {
    let mut best = vertices[face[0]];
    let mut best_distance = f64::INFINITY;
    for k in 0..face.len() {
        let candidate = closest_on_segment(vertices[face[k]], vertices[face[(k + 1) % face.len()]], point);
        let d = candidate.distance_squared(point);
        if d < best_distance {
            best_distance = d;
            best = candidate;
        }
    }
    best
}

pub(super) fn closest_on_segment(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    let edge = b - a;
    let length_squared = edge.length_squared();
    if length_squared <= f64::EPSILON {
        return a;
    }
    let t = ((point - a).dot(edge) / length_squared).clamp(0.0, 1.0);
    a + edge * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Shape;

    #[test]
    fn test_sphere_on_box_face_edge_and_corner() {
        let cube = Shape::cuboid(Vec3::splat(0.5));
        let hull = match cube.geometry() {
            Geometry::Box(b) => b.hull().clone(),
            _ => unreachable!(),
        };
        let mut m = Manifold::new();

        // Face
        assert!(sphere_hull(&mut m, Vec3::new(0.1, 0.9, 0.0), 0.5, &hull, Vec3::ZERO, Quat::IDENTITY, false));
        assert!(m.points[0].normal.almost_equals(-Vec3::Y, 1e-12));
        assert!((m.points[0].depth() - 0.1).abs() < 1e-12);

        // Edge
        m.clear();
        let c = Vec3::new(0.8, 0.8, 0.0);
        assert!(sphere_hull(&mut m, c, 0.5, &hull, Vec3::ZERO, Quat::IDENTITY, false));
        assert!(m.points[0].point_b.almost_equals(Vec3::new(0.5, 0.5, 0.0), 1e-12));

        // Corner out of reach
        m.clear();
        assert!(!sphere_hull(&mut m, Vec3::splat(0.9), 0.5, &hull, Vec3::ZERO, Quat::IDENTITY, false));
    }

    #[test]
    fn test_sphere_centre_inside_box() {
        let hull = ConvexPolyhedron::cuboid(Vec3::new(2.0, 0.5, 2.0));
        let mut m = Manifold::new();
        assert!(sphere_hull(&mut m, Vec3::new(0.0, 0.3, 0.0), 0.25, &hull, Vec3::ZERO, Quat::IDENTITY, false));
        // Pushed out through the top, the nearest face
        assert!(m.points[0].normal.almost_equals(-Vec3::Y, 1e-12));
        assert!((m.points[0].depth() - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_particle_inside_sphere() {
        let sphere = Shape::sphere(1.0);
        let particle = Shape::particle();
        let mut m = Manifold::new();
        let a = ShapePose::new(sphere.geometry(), Vec3::ZERO, Quat::IDENTITY);
        let b = ShapePose::new(particle.geometry(), Vec3::new(0.0, 0.0, 0.5), Quat::IDENTITY);
        assert!(sphere_particle(&mut m, &a, &b, false));
        assert!(m.points[0].normal.almost_equals(Vec3::Z, 1e-12));
        assert!((m.points[0].depth() - 0.5).abs() < 1e-12);
    }
}
