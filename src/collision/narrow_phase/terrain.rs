use crate::collision::contact::{push_unique, ContactPoint};
use crate::geometry::{Aabb, ConvexPolyhedron, Geometry, Heightfield};
use crate::math::Vec3;

use super::convex::hull_hull;
use super::sphere::{closest_on_segment, sphere_hull};
use super::{Manifold, ShapePose};

/// Contacts closer than this on the terrain side are merged.
const MERGE_DISTANCE: f64 = 1e-6;

/// Normals closer than this cosine point the same way.
const ALIGNED_NORMAL_COS: f64 = 0.999;

/// Calls `visit` with every cell pillar under a local-space box, stopping
/// early when it returns `true`.
fn for_each_pillar(
    field: &Heightfield,
    local_aabb: Aabb,
    mut visit: impl FnMut(&ConvexPolyhedron, Vec3) -> bool,
) {
    let Some((i0, i1, j0, j1)) = field.cell_range(local_aabb) else {
        return;
    };
    for i in i0..=i1 {
        for j in j0..=j1 {
            let (_, highest) = field.cell_height_range(i, j);
            if local_aabb.min.y > highest {
                continue;
            }
            for upper in [false, true] {
                // Degenerate cells are skipped
                let Ok((pillar, centroid)) = field.convex_pillar(i, j, upper) else {
                    continue;
                };
                if visit(&pillar, centroid) {
                    return;
                }
            }
        }
    }
}

/// Drops freshly emitted contacts that duplicate earlier ones.
fn merge_new(m: &mut Manifold, start: usize) {
    let tolerance_squared = MERGE_DISTANCE * MERGE_DISTANCE;
    let mut kept = start;
    for k in start..m.points.len() {
        let contact = m.points[k];
        let duplicate = m.points[..kept]
            .iter()
            .any(|p| p.point_b.distance_squared(contact.point_b) < tolerance_squared);
        if !duplicate {
            m.points[kept] = contact;
            kept += 1;
        }
    }
    m.points.truncate(kept);
}

pub(super) fn sphere_heightfield(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let (Geometry::Sphere(sphere), Geometry::Heightfield(field)) = (a.geometry, b.geometry) else {
        return false;
    };
    let r = sphere.radius;
    let local_center = b.rotation.inverse_rotate_vec(a.position - b.position);
    let local_aabb = Aabb::from_center_half_extents(local_center, Vec3::splat(r));

    let first = m.points.len();
    let mut hit = false;
    for_each_pillar(field, local_aabb, |pillar, centroid| {
        let start = m.points.len();
        let pillar_position = b.position + b.rotation.rotate_vec(centroid);
        if sphere_hull(m, a.position, r, pillar, pillar_position, b.rotation, just_test) {
            hit = true;
            merge_new(m, start);
        }
        hit && just_test
    });
    if hit && !just_test {
        drop_seam_contacts(m, first);
    }
    hit
}

/// Removes shallower contacts lying in the surface plane of a deeper one
/// with a different normal, such as a pillar edge next to a touching face.
fn drop_seam_contacts(m: &mut Manifold, start: usize) {
    for k in (start..m.points.len()).rev() {
        let c = m.points[k];
        let covered = m.points[start..].iter().any(|f| {
            f.normal.dot(c.normal) < ALIGNED_NORMAL_COS
                && f.depth() >= c.depth()
                && (c.point_b - f.point_b).dot(f.normal).abs() < MERGE_DISTANCE
        });
        if covered {
            m.points.remove(k);
        }
    }
}

pub(super) fn box_heightfield(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    convex_heightfield(m, a, b, just_test)
}

pub(super) fn convex_heightfield(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let (Some(hull), Geometry::Heightfield(field)) = (a.geometry.hull(), b.geometry) else {
        return false;
    };

    // Pose of the hull in the heightfield frame
    let inverse = b.rotation.inverse();
    let local_position = inverse.rotate_vec(a.position - b.position);
    let local_rotation = inverse * a.rotation;
    let local_aabb = hull.local_aabb().transformed(local_position, local_rotation);

    let mut hit = false;
    for_each_pillar(field, local_aabb, |pillar, centroid| {
        let start = m.points.len();
        let pillar_position = b.position + b.rotation.rotate_vec(centroid);
        if hull_hull(
            m,
            hull,
            a.position,
            a.rotation,
            pillar,
            pillar_position,
            b.rotation,
            just_test,
        ) {
            hit = true;
            merge_new(m, start);
        }
        hit && just_test
    });
    hit
}

pub(super) fn sphere_trimesh(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let (Geometry::Sphere(sphere), Geometry::Trimesh(mesh)) = (a.geometry, b.geometry) else {
        return false;
    };
    let r = sphere.radius;
    let local_center = b.rotation.inverse_rotate_vec(a.position - b.position);
    let local_aabb = Aabb::from_center_half_extents(local_center, Vec3::splat(r));

    m.triangles.clear();
    mesh.triangles_in_aabb(local_aabb, &mut m.triangles);
    m.triangles.retain(|&index| !mesh.is_degenerate(index as usize));

    let to_world = |local_point: Vec3, local_normal: Vec3| {
        let normal = b.rotation.rotate_vec(local_normal);
        let point_b = b.position + b.rotation.rotate_vec(local_point);
        ContactPoint::new(a.position + normal * r, point_b, normal)
    };
    let touches_face = |p0: Vec3, p1: Vec3, p2: Vec3| {
        face_projection(p0, p1, p2, local_center).filter(|p| p.distance_squared(local_center) < r * r)
    };

    // Faces the centre projects onto come first
    let start = m.points.len();
    let mut hit = false;
    for &index in &m.triangles {
        let index = index as usize;
        let [p0, p1, p2] = mesh.triangle(index);
        let Some(projected) = touches_face(p0, p1, p2) else {
            continue;
        };
        hit = true;
        if just_test {
            return true;
        }
        let face_normal = mesh.normal(index);
        let local_normal = if face_normal.dot(local_center - p0) >= 0.0 {
            -face_normal
        } else {
            face_normal
        };
        push_unique(&mut m.points, to_world(projected, local_normal), MERGE_DISTANCE);
    }

    // Edges and vertices, unless a touching face already covers them
    for &index in &m.triangles {
        let index = index as usize;
        let [p0, p1, p2] = mesh.triangle(index);
        if face_projection(p0, p1, p2, local_center).is_some() {
            continue;
        }
        let closest = closest_on_triangle(p0, p1, p2, local_center);
        let offset = closest - local_center;
        if offset.length_squared() >= r * r {
            continue;
        }
        hit = true;
        if just_test {
            return true;
        }

        let on_touching_face = m.triangles.iter().any(|&other| {
            let [q0, q1, q2] = mesh.triangle(other as usize);
            touches_face(q0, q1, q2).is_some()
                && closest_on_triangle(q0, q1, q2, closest).distance_squared(closest) < MERGE_DISTANCE * MERGE_DISTANCE
        });
        if on_touching_face {
            continue;
        }

        let local_normal = offset.try_normalize().unwrap_or_else(|| -mesh.normal(index));
        let contact = to_world(closest, local_normal);
        let aligned = m.points[start..]
            .iter()
            .any(|p| p.normal.dot(contact.normal) > ALIGNED_NORMAL_COS);
        if !aligned {
            push_unique(&mut m.points, contact, MERGE_DISTANCE);
        }
    }
    hit
}

/// Projection of `p` on the triangle's plane, if it falls inside the triangle.
fn face_projection(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> Option<Vec3> {
    let n = (b - a).cross(c - a).try_normalize()?;
    let projected = p - n * n.dot(p - a);
    let closest = closest_on_triangle(a, b, c, p);
    (closest.distance_squared(projected) < MERGE_DISTANCE * MERGE_DISTANCE).then_some(projected)
}

/// Closest point of triangle `(a, b, c)` to `p`.
pub(crate) fn closest_on_triangle(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let normal = ab.cross(ac);
    let Some(n) = normal.try_normalize() else {
        return closest_on_segment(a, b, p);
    };

    let projected = p - n * n.dot(p - a);
    // Barycentric inside test on the projected point
    let inside = [(a, b), (b, c), (c, a)]
        .iter()
        .all(|&(u, v)| (v - u).cross(projected - u).dot(normal) >= 0.0);
    if inside {
        return projected;
    }

    [
        closest_on_segment(a, b, p),
        closest_on_segment(b, c, p),
        closest_on_segment(c, a, p),
    ]
    .into_iter()
    .min_by(|x, y| x.distance_squared(p).total_cmp(&y.distance_squared(p)))
    .unwrap_or(a)
}
