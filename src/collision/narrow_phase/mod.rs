//! Exact shape-pair collision.
//!
//! [`collide`] looks up the routine for a pair of shape classes in a static
//! table and runs it. Every routine writes [`ContactPoint`]s oriented from its
//! first shape to its second; with `just_test` set it stops at the first one.

mod convex;
mod generator;
mod plane;
mod sphere;
mod terrain;

use crate::geometry::{ClipBuffers, ClipPoint, Geometry};
use crate::math::{Quat, Vec3};

use super::contact::ContactPoint;

pub use generator::{Narrowphase, PairMaterial, CONTACT_MAX_FORCE};

/// A shape placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct ShapePose<'a> {
    pub geometry: &'a Geometry,
    pub position: Vec3,
    pub rotation: Quat,
}

impl<'a> ShapePose<'a> {
    pub fn new(geometry: &'a Geometry, position: Vec3, rotation: Quat) -> Self {
        Self {
            geometry,
            position,
            rotation,
        }
    }
}

/// Scratch buffers shared by the routines of one [`collide`] call.
#[derive(Debug, Default)]
pub struct Manifold {
    pub points: Vec<ContactPoint>,
    clip: Vec<ClipPoint>,
    clip_buffers: ClipBuffers,
    triangles: Vec<u32>,
}

impl Manifold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.clip.clear();
        self.triangles.clear();
    }
}

type PairRoutine = fn(&mut Manifold, &ShapePose, &ShapePose, bool) -> bool;

/// Row/column of the dispatch table; cylinders collide as convex hulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ShapeClass {
    Sphere = 0,
    Plane,
    Box,
    Convex,
    Particle,
    Heightfield,
    Trimesh,
}

const CLASS_COUNT: usize = 7;

impl ShapeClass {
    fn of(geometry: &Geometry) -> Self {
        match geometry {
            Geometry::Sphere(_) => ShapeClass::Sphere,
            Geometry::Plane(_) => ShapeClass::Plane,
            Geometry::Box(_) => ShapeClass::Box,
            Geometry::ConvexPolyhedron(_) | Geometry::Cylinder(_) => ShapeClass::Convex,
            Geometry::Particle => ShapeClass::Particle,
            Geometry::Heightfield(_) => ShapeClass::Heightfield,
            Geometry::Trimesh(_) => ShapeClass::Trimesh,
        }
    }
}

const fn build_table() -> [[Option<PairRoutine>; CLASS_COUNT]; CLASS_COUNT] {
    use ShapeClass::*;

    let mut t: [[Option<PairRoutine>; CLASS_COUNT]; CLASS_COUNT] = [[None; CLASS_COUNT]; CLASS_COUNT];

    t[Sphere as usize][Sphere as usize] = Some(sphere::sphere_sphere);
    t[Sphere as usize][Plane as usize] = Some(sphere::sphere_plane);
    t[Sphere as usize][Box as usize] = Some(sphere::sphere_box);
    t[Sphere as usize][Convex as usize] = Some(sphere::sphere_convex);
    t[Sphere as usize][Particle as usize] = Some(sphere::sphere_particle);
    t[Sphere as usize][Heightfield as usize] = Some(terrain::sphere_heightfield);
    t[Sphere as usize][Trimesh as usize] = Some(terrain::sphere_trimesh);

    t[Plane as usize][Box as usize] = Some(plane::plane_box);
    t[Plane as usize][Convex as usize] = Some(plane::plane_convex);
    t[Plane as usize][Particle as usize] = Some(plane::plane_particle);
    t[Plane as usize][Trimesh as usize] = Some(plane::plane_trimesh);

    t[Box as usize][Box as usize] = Some(convex::box_box);
    t[Box as usize][Convex as usize] = Some(convex::box_convex);
    t[Box as usize][Particle as usize] = Some(convex::box_particle);
    t[Box as usize][Heightfield as usize] = Some(terrain::box_heightfield);

    t[Convex as usize][Convex as usize] = Some(convex::convex_convex);
    t[Convex as usize][Particle as usize] = Some(convex::convex_particle);
    t[Convex as usize][Heightfield as usize] = Some(terrain::convex_heightfield);

    t
}

static DISPATCH: [[Option<PairRoutine>; CLASS_COUNT]; CLASS_COUNT] = build_table();

/// Whether a routine exists for the two geometries, in either order.
pub fn is_supported(a: &Geometry, b: &Geometry) -> bool {
    let (ca, cb) = (ShapeClass::of(a), ShapeClass::of(b));
    let (lo, hi) = if ca <= cb { (ca, cb) } else { (cb, ca) };
    DISPATCH[lo as usize][hi as usize].is_some()
}

/// Runs the routine for `a` against `b`.
///
/// Contact points are appended to `manifold.points`, oriented from `a` to `b`
/// whichever order the table stores the pair in. Returns whether the shapes
/// touch; unsupported pairs never do.
pub fn collide(manifold: &mut Manifold, a: &ShapePose, b: &ShapePose, just_test: bool) -> bool {
    let (ca, cb) = (ShapeClass::of(a.geometry), ShapeClass::of(b.geometry));

    if ca <= cb {
        match DISPATCH[ca as usize][cb as usize] {
            Some(routine) => routine(manifold, a, b, just_test),
            None => false,
        }
    } else {
        let Some(routine) = DISPATCH[cb as usize][ca as usize] else {
            return false;
        };
        let start = manifold.points.len();
        let hit = routine(manifold, b, a, just_test);
        for p in &mut manifold.points[start..] {
            *p = p.flipped();
        }
        hit
    }
}

/// Records a contact unless the routine only tests for overlap.
///
/// Returns `true` so routines can `return emit(...)` on the first hit.
#[inline]
fn emit(manifold: &mut Manifold, just_test: bool, contact: ContactPoint) -> bool {
    if !just_test {
        manifold.points.push(contact);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ConvexPolyhedron, Heightfield, Shape, Trimesh};
    use crate::math::consts::FRAC_PI_2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn run(a: &ShapePose, b: &ShapePose) -> (bool, bool, Vec<ContactPoint>) {
        let mut manifold = Manifold::new();
        let tested = collide(&mut manifold, a, b, true);
        assert!(manifold.points.is_empty(), "just_test must not emit contacts");
        let hit = collide(&mut manifold, a, b, false);
        (tested, hit && !manifold.points.is_empty(), manifold.points)
    }

    fn sample_shapes() -> Vec<Shape> {
        let mesh = Trimesh::new(
            vec![
                Vec3::new(-2.0, 0.0, -2.0),
                Vec3::new(2.0, 0.0, -2.0),
                Vec3::new(2.0, 0.0, 2.0),
                Vec3::new(-2.0, 0.0, 2.0),
            ],
            vec![0, 2, 1, 0, 3, 2],
        )
        .unwrap();
        let field = Heightfield::new(
            vec![
                vec![0.0, 0.2, 0.0, 0.1],
                vec![0.1, 0.5, 0.3, 0.0],
                vec![0.0, 0.2, 0.4, 0.2],
                vec![0.3, 0.0, 0.1, 0.0],
            ],
            1.0,
        )
        .unwrap();
        let tetra = ConvexPolyhedron::new(
            vec![
                Vec3::new(0.0, 0.6, 0.0),
                Vec3::new(-0.5, -0.3, -0.4),
                Vec3::new(0.5, -0.3, -0.4),
                Vec3::new(0.0, -0.3, 0.6),
            ],
            vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]],
        )
        .unwrap();
        vec![
            Shape::sphere(0.5),
            Shape::plane(),
            Shape::cuboid(Vec3::new(0.5, 0.4, 0.3)),
            Shape::convex(tetra),
            Shape::cylinder(0.4, 0.4, 1.0, 8).unwrap(),
            Shape::particle(),
            Shape::heightfield(field),
            Shape::trimesh(mesh),
        ]
    }

    #[test]
    fn test_just_test_agrees_with_full_routine() {
        let shapes = sample_shapes();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut hits = 0;

        for a in &shapes {
            for b in &shapes {
                if !is_supported(a.geometry(), b.geometry()) {
                    continue;
                }
                for _ in 0..40 {
                    let pa = Vec3::new(rng.gen_range(0.0..3.0), rng.gen_range(-0.5..1.5), rng.gen_range(0.0..3.0));
                    let pb = pa + Vec3::new(rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2), rng.gen_range(-1.2..1.2));
                    let axis = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                    let qa = Quat::from_axis_angle(axis, rng.gen_range(-0.5..0.5));
                    let qb = Quat::from_axis_angle(axis.cross(Vec3::Y), rng.gen_range(-0.5..0.5));

                    let pose_a = ShapePose::new(a.geometry(), pa, qa);
                    let pose_b = ShapePose::new(b.geometry(), pb, qb);
                    let (tested, produced, _) = run(&pose_a, &pose_b);
                    assert_eq!(
                        tested,
                        produced,
                        "{:?} vs {:?} disagrees",
                        a.shape_type(),
                        b.shape_type()
                    );
                    hits += usize::from(produced);
                }
            }
        }
        assert!(hits > 0);
    }

    #[test]
    fn test_sphere_sphere_iff_overlapping() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let r1 = rng.gen_range(0.1..1.0);
            let r2 = rng.gen_range(0.1..1.0);
            let s1 = Shape::sphere(r1);
            let s2 = Shape::sphere(r2);
            let c1 = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let c2 = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            let (_, produced, points) = run(
                &ShapePose::new(s1.geometry(), c1, Quat::IDENTITY),
                &ShapePose::new(s2.geometry(), c2, Quat::IDENTITY),
            );

            let distance = c1.distance(c2);
            assert_eq!(produced, distance < r1 + r2);
            if produced && distance > 1e-9 {
                let expected = (c2 - c1).normalize();
                assert!(points[0].normal.almost_equals(expected, 1e-9));
            }
        }
    }

    #[test]
    fn test_swapped_order_flips_normal() {
        let sphere = Shape::sphere(0.5);
        let plane = Shape::plane();
        let sphere_pose = ShapePose::new(sphere.geometry(), Vec3::new(0.0, 0.4, 0.0), Quat::IDENTITY);
        let plane_pose = ShapePose::new(plane.geometry(), Vec3::ZERO, Quat::IDENTITY);

        let (_, _, forward) = run(&sphere_pose, &plane_pose);
        let (_, _, backward) = run(&plane_pose, &sphere_pose);
        assert!(forward[0].normal.almost_equals(-Vec3::Y, 1e-12));
        assert!(backward[0].normal.almost_equals(Vec3::Y, 1e-12));
        assert!((backward[0].depth() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_box_resting_on_plane_has_four_points() {
        let cube = Shape::cuboid(Vec3::splat(0.5));
        let plane = Shape::plane();
        let (_, _, points) = run(
            &ShapePose::new(plane.geometry(), Vec3::ZERO, Quat::IDENTITY),
            &ShapePose::new(cube.geometry(), Vec3::new(0.0, 0.49, 0.0), Quat::IDENTITY),
        );
        assert_eq!(points.len(), 4);
        for p in &points {
            assert!((p.depth() - 0.01).abs() < 1e-9);
        }
    }

    #[test]
    fn test_box_on_box_face_contact() {
        let cube = Shape::cuboid(Vec3::splat(0.5));
        let (_, _, points) = run(
            &ShapePose::new(cube.geometry(), Vec3::ZERO, Quat::IDENTITY),
            &ShapePose::new(
                cube.geometry(),
                Vec3::new(0.1, 0.95, 0.0),
                Quat::from_axis_angle(Vec3::Y, FRAC_PI_2 * 0.3),
            ),
        );
        assert!(points.len() >= 3);
        for p in &points {
            assert!(p.normal.almost_equals(Vec3::Y, 1e-9));
            assert!((p.depth() - 0.05).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unsupported_pairs_do_nothing() {
        let a = Shape::plane();
        let b = Shape::plane();
        let mut manifold = Manifold::new();
        let pose = ShapePose::new(a.geometry(), Vec3::ZERO, Quat::IDENTITY);
        assert!(!collide(&mut manifold, &pose, &ShapePose::new(b.geometry(), Vec3::ZERO, Quat::IDENTITY), false));
        assert!(!is_supported(Shape::particle().geometry(), Shape::particle().geometry()));
    }
}
