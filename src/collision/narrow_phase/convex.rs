use crate::collision::contact::ContactPoint;
use crate::geometry::ConvexPolyhedron;
use crate::math::{Quat, Vec3};

use super::{emit, Manifold, ShapePose};

const CLIP_MIN_DIST: f64 = -100.0;
const CLIP_MAX_DIST: f64 = 100.0;

pub(super) fn box_box(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    convex_convex(m, a, b, just_test)
}

pub(super) fn box_convex(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    convex_convex(m, a, b, just_test)
}

pub(super) fn box_particle(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    convex_particle(m, a, b, just_test)
}

pub(super) fn convex_convex(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    match (a.geometry.hull(), b.geometry.hull()) {
        (Some(hull_a), Some(hull_b)) => hull_hull(
            m,
            hull_a,
            a.position,
            a.rotation,
            hull_b,
            b.position,
            b.rotation,
            just_test,
        ),
        _ => false,
    }
}

pub(super) fn convex_particle(m: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let Some(hull) = a.geometry.hull() else {
        return false;
    };
    let local = a.rotation.inverse_rotate_vec(b.position - a.position);
    let vertices = hull.vertices();

    // Face the particle is least deep behind
    let mut best: Option<(f64, Vec3)> = None;
    for (face, &normal) in hull.faces().iter().zip(hull.face_normals()) {
        let distance = normal.dot(local - vertices[face[0]]);
        if distance >= 0.0 {
            return false;
        }
        if best.map_or(true, |(d, _)| distance > d) {
            best = Some((distance, normal));
        }
    }

    let Some((distance, normal)) = best else {
        return false;
    };
    let world_normal = a.rotation.rotate_vec(normal);
    emit(
        m,
        just_test,
        ContactPoint::new(b.position - world_normal * distance, b.position, world_normal),
    )
}

/// Separating-axis test followed by face clipping.
///
/// Each clipped point of B's incident face that lies behind A's reference
/// face becomes a contact along the separating axis.
#[allow(clippy::too_many_arguments)]
pub(super) fn hull_hull(
    m: &mut Manifold,
    hull_a: &ConvexPolyhedron,
    pos_a: Vec3,
    quat_a: Quat,
    hull_b: &ConvexPolyhedron,
    pos_b: Vec3,
    quat_b: Quat,
    just_test: bool,
) -> bool {
    let Some(axis) = hull_a.find_separating_axis(hull_b, pos_a, quat_a, pos_b, quat_b) else {
        return false;
    };

    m.clip.clear();
    hull_a.clip_against_hull(
        pos_a,
        quat_a,
        hull_b,
        pos_b,
        quat_b,
        axis,
        CLIP_MIN_DIST,
        CLIP_MAX_DIST,
        &mut m.clip_buffers,
        &mut m.clip,
    );
    if m.clip.is_empty() {
        return false;
    }
    if just_test {
        return true;
    }

    for k in 0..m.clip.len() {
        let clip = m.clip[k];
        let on_a = clip.point - clip.normal * clip.depth;
        emit(m, just_test, ContactPoint::new(on_a, clip.point, axis));
    }
    true
}
