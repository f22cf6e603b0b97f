//! Segment queries against bodies.
//!
//! A [`Ray`] is a from/to segment. Hits are collected according to a
//! [`RayMode`]: the closest one, the first one found, or every one.

use serde::{Deserialize, Serialize};

use crate::dynamics::{BodyHandle, RigidBody};
use crate::geometry::{point_in_polygon, Aabb, ConvexPolyhedron, Geometry, Heightfield, Plane, Shape, Trimesh};
use crate::math::consts::EPSILON;
use crate::math::{Quat, Vec3};

/// Segments shorter than this hit nothing.
const MIN_RAY_LENGTH: f64 = 1e-12;

/// How hits are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RayMode {
    /// Keep only the hit nearest to `from`
    #[default]
    Closest,
    /// Stop at the first hit found
    Any,
    /// Report every hit to the callback
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayOptions {
    pub mode: RayMode,
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// Ignore faces whose normal points along the ray
    pub skip_backfaces: bool,
    /// Ignore bodies and shapes with collision response turned off
    pub check_collision_response: bool,
}

impl Default for RayOptions {
    fn default() -> Self {
        Self {
            mode: RayMode::Closest,
            collision_filter_group: u32::MAX,
            collision_filter_mask: u32::MAX,
            skip_backfaces: false,
            check_collision_response: true,
        }
    }
}

impl RayOptions {
    pub fn with_mode(mut self, mode: RayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_skip_backfaces(mut self, skip_backfaces: bool) -> Self {
        self.skip_backfaces = skip_backfaces;
        self
    }

    pub fn with_check_collision_response(mut self, check: bool) -> Self {
        self.check_collision_response = check;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastResult {
    pub body: BodyHandle,
    pub shape_index: usize,
    pub hit_point: Vec3,
    pub hit_normal: Vec3,
    /// Distance from `from` to the hit point
    pub distance: f64,
    /// Polyhedron face or mesh triangle that was hit
    pub face_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub from: Vec3,
    pub to: Vec3,
}

/// A hit before it is tagged with its body and shape.
#[derive(Debug, Clone, Copy)]
struct ShapeHit {
    point: Vec3,
    normal: Vec3,
    face: Option<usize>,
}

/// Mode bookkeeping shared by every shape routine of one query.
struct Collector<'c> {
    mode: RayMode,
    from: Vec3,
    closest: Option<RaycastResult>,
    done: bool,
    callback: &'c mut dyn FnMut(&RaycastResult),
    /// Hits of the shape under test, reused from shape to shape
    hits: Vec<ShapeHit>,
}

impl Collector<'_> {
    fn report(&mut self, result: RaycastResult) {
        match self.mode {
            RayMode::Closest => {
                if self.closest.map_or(true, |c| result.distance < c.distance) {
                    self.closest = Some(result);
                }
            }
            RayMode::Any => {
                self.closest = Some(result);
                self.done = true;
            }
            RayMode::All => {
                (self.callback)(&result);
                if self.closest.map_or(true, |c| result.distance < c.distance) {
                    self.closest = Some(result);
                }
            }
        }
    }
}

impl Ray {
    pub fn new(from: Vec3, to: Vec3) -> Self {
        Self { from, to }
    }

    pub fn length(&self) -> f64 {
        self.from.distance(self.to)
    }

    /// Unit direction, `None` for a zero-length segment.
    pub fn direction(&self) -> Option<Vec3> {
        let d = self.to - self.from;
        if d.length_squared() < MIN_RAY_LENGTH * MIN_RAY_LENGTH {
            return None;
        }
        d.try_normalize()
    }

    /// Box enclosing the segment.
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.from.min(self.to), self.from.max(self.to))
    }

    /// Tests the segment against candidate bodies.
    ///
    /// Returns the closest hit (or, with [`RayMode::Any`], the first one).
    /// With [`RayMode::All`] every hit is also passed to `callback`.
    pub fn intersect_bodies<'b>(
        &self,
        bodies: impl IntoIterator<Item = (BodyHandle, &'b RigidBody)>,
        options: &RayOptions,
        callback: &mut dyn FnMut(&RaycastResult),
    ) -> Option<RaycastResult> {
        let direction = self.direction()?;
        let mut collector = Collector {
            mode: options.mode,
            from: self.from,
            closest: None,
            done: false,
            callback,
            hits: Vec::new(),
        };

        for (handle, body) in bodies {
            if collector.done {
                break;
            }
            self.intersect_body(handle, body, direction, options, &mut collector);
        }
        collector.closest
    }

    fn intersect_body(
        &self,
        handle: BodyHandle,
        body: &RigidBody,
        direction: Vec3,
        options: &RayOptions,
        collector: &mut Collector,
    ) {
        if options.check_collision_response && !body.collision_response {
            return;
        }
        if options.collision_filter_group & body.collision_filter_mask == 0
            || body.collision_filter_group & options.collision_filter_mask == 0
        {
            return;
        }

        for (index, entry) in body.shapes().iter().enumerate() {
            if collector.done {
                return;
            }
            let shape: &Shape = &entry.shape;
            if options.check_collision_response && !shape.collision_response {
                continue;
            }
            let (position, rotation) = body.shape_world_pose(index);
            let mut hits = std::mem::take(&mut collector.hits);
            hits.clear();
            self.intersect_geometry(shape.geometry(), position, rotation, direction, options.skip_backfaces, &mut hits);

            for &hit in &hits {
                collector.report(RaycastResult {
                    body: handle,
                    shape_index: index,
                    hit_point: hit.point,
                    hit_normal: hit.normal,
                    distance: collector.from.distance(hit.point),
                    face_index: hit.face,
                });
                if collector.done {
                    break;
                }
            }
            collector.hits = hits;
        }
    }

    fn intersect_geometry(
        &self,
        geometry: &Geometry,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        skip_backfaces: bool,
        hits: &mut Vec<ShapeHit>,
    ) {
        match geometry {
            Geometry::Sphere(sphere) => self.intersect_sphere(sphere.radius, position, hits),
            Geometry::Plane(_) => self.intersect_plane(position, rotation, direction, skip_backfaces, hits),
            Geometry::Box(_) | Geometry::ConvexPolyhedron(_) | Geometry::Cylinder(_) => {
                if let Some(hull) = geometry.hull() {
                    self.intersect_hull(hull, position, rotation, direction, skip_backfaces, hits);
                }
            }
            Geometry::Heightfield(field) => {
                self.intersect_heightfield(field, position, rotation, skip_backfaces, hits)
            }
            Geometry::Trimesh(mesh) => self.intersect_trimesh(mesh, position, rotation, skip_backfaces, hits),
            Geometry::Particle => {}
        }
    }

    /// Both roots of the segment/sphere quadratic that lie on the segment.
    fn intersect_sphere(&self, radius: f64, center: Vec3, hits: &mut Vec<ShapeHit>) {
        let d = self.to - self.from;
        let m = self.from - center;
        let a = d.length_squared();
        let b = 2.0 * d.dot(m);
        let c = m.length_squared() - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return;
        }

        let root = discriminant.sqrt();
        let roots = [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)];
        let count = if discriminant == 0.0 { 1 } else { 2 };
        for &t in &roots[..count] {
            if (0.0..=1.0).contains(&t) {
                let point = self.from + d * t;
                if let Some(normal) = (point - center).try_normalize() {
                    hits.push(ShapeHit { point, normal, face: None });
                }
            }
        }
    }

    fn intersect_plane(
        &self,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        skip_backfaces: bool,
        hits: &mut Vec<ShapeHit>,
    ) {
        let normal = rotation.rotate_vec(Plane::LOCAL_NORMAL);
        if skip_backfaces && normal.dot(direction) > 0.0 {
            return;
        }
        let from_side = (self.from - position).dot(normal);
        let to_side = (self.to - position).dot(normal);
        if from_side * to_side > 0.0 || from_side == to_side {
            return;
        }
        let t = from_side / (from_side - to_side);
        hits.push(ShapeHit {
            point: self.from.lerp(self.to, t),
            normal,
            face: None,
        });
    }

    /// Every face the segment crosses, using the hull's face planes.
    fn intersect_hull(
        &self,
        hull: &ConvexPolyhedron,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        skip_backfaces: bool,
        hits: &mut Vec<ShapeHit>,
    ) {
        let length = self.length();
        for (index, &local_normal) in hull.face_normals().iter().enumerate() {
            let normal = rotation.rotate_vec(local_normal);
            if skip_backfaces && normal.dot(direction) > 0.0 {
                continue;
            }
            let on_plane = rotation.rotate_vec(hull.vertices()[hull.faces()[index][0]]) + position;
            if let Some(point) = segment_plane(self.from, direction, length, on_plane, normal) {
                if hull.face_contains(index, rotation.inverse_rotate_vec(point - position)) {
                    hits.push(ShapeHit {
                        point,
                        normal,
                        face: Some(index),
                    });
                }
            }
        }
    }

    fn intersect_trimesh(
        &self,
        mesh: &Trimesh,
        position: Vec3,
        rotation: Quat,
        skip_backfaces: bool,
        hits: &mut Vec<ShapeHit>,
    ) {
        let (from, to) = self.to_local(position, rotation);
        let Some(local_direction) = (to - from).try_normalize() else {
            return;
        };
        let length = from.distance(to);

        mesh.triangles_along_ray(from, to, |index| {
            let index = index as usize;
            if mesh.is_degenerate(index) {
                return;
            }
            let normal = mesh.normal(index);
            if let Some(point) =
                triangle_hit(from, local_direction, length, &mesh.triangle(index), normal, skip_backfaces)
            {
                hits.push(ShapeHit {
                    point: position + rotation.rotate_vec(point),
                    normal: rotation.rotate_vec(normal),
                    face: Some(index),
                });
            }
        });
    }

    /// Walks the cells under the segment; both triangles of a cell face up.
    fn intersect_heightfield(
        &self,
        field: &Heightfield,
        position: Vec3,
        rotation: Quat,
        skip_backfaces: bool,
        hits: &mut Vec<ShapeHit>,
    ) {
        let (from, to) = self.to_local(position, rotation);
        let Some(local_direction) = (to - from).try_normalize() else {
            return;
        };
        let length = from.distance(to);
        let segment = Aabb::new(from.min(to), from.max(to));
        let Some((i0, i1, j0, j1)) = field.cell_range(segment) else {
            return;
        };

        for i in i0..=i1 {
            for j in j0..=j1 {
                let (lowest, highest) = field.cell_height_range(i, j);
                if segment.min.y > highest || segment.max.y < lowest {
                    continue;
                }
                for (k, upper) in [false, true].into_iter().enumerate() {
                    let triangle = field.triangle(i, j, upper);
                    let Some(mut normal) = (triangle[1] - triangle[0])
                        .cross(triangle[2] - triangle[0])
                        .try_normalize()
                    else {
                        continue;
                    };
                    if normal.y < 0.0 {
                        normal = -normal;
                    }
                    if let Some(point) =
                        triangle_hit(from, local_direction, length, &triangle, normal, skip_backfaces)
                    {
                        hits.push(ShapeHit {
                            point: position + rotation.rotate_vec(point),
                            normal: rotation.rotate_vec(normal),
                            face: Some(2 * (i * field.cells_z() + j) + k),
                        });
                    }
                }
            }
        }
    }

    fn to_local(&self, position: Vec3, rotation: Quat) -> (Vec3, Vec3) {
        (
            rotation.inverse_rotate_vec(self.from - position),
            rotation.inverse_rotate_vec(self.to - position),
        )
    }
}

/// Point where the segment `from + direction * t`, `t` in `[0, length]`,
/// crosses the plane through `on_plane` with `normal`.
fn segment_plane(from: Vec3, direction: Vec3, length: f64, on_plane: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = normal.dot(direction);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = normal.dot(on_plane - from) / denom;
    if !(0.0..=length).contains(&t) {
        return None;
    }
    Some(from + direction * t)
}

fn triangle_hit(
    from: Vec3,
    direction: Vec3,
    length: f64,
    triangle: &[Vec3; 3],
    normal: Vec3,
    skip_backfaces: bool,
) -> Option<Vec3> {
    if skip_backfaces && normal.dot(direction) > 0.0 {
        return None;
    }
    let point = segment_plane(from, direction, length, triangle[0], normal)?;
    point_in_polygon(triangle, normal, point).then_some(point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn cast(ray: &Ray, bodies: &SlotMap<BodyHandle, RigidBody>, options: &RayOptions) -> Option<RaycastResult> {
        ray.intersect_bodies(bodies.iter(), options, &mut |_| {})
    }

    #[test]
    fn test_sphere_near_side() {
        let mut bodies = SlotMap::with_key();
        let ball = bodies.insert(RigidBody::new(1.0).with_shape(Shape::sphere(1.0)));
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));

        let hit = cast(&ray, &bodies, &RayOptions::default()).unwrap();
        assert_eq!(hit.body, ball);
        assert!(hit.hit_point.almost_equals(Vec3::new(-1.0, 0.0, 0.0), 1e-9));
        assert!(hit.hit_normal.almost_equals(-Vec3::X, 1e-9));
        assert!((hit.distance - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_box_faces_and_backfaces() {
        let mut bodies = SlotMap::with_key();
        bodies.insert(
            RigidBody::new(1.0)
                .with_shape(Shape::cuboid(Vec3::splat(0.5)))
                .with_position(Vec3::new(0.0, 2.0, 0.0)),
        );
        let ray = Ray::new(Vec3::new(0.1, 10.0, 0.1), Vec3::new(0.1, -10.0, 0.1));

        let mut all = Vec::new();
        let options = RayOptions::default().with_mode(RayMode::All);
        ray.intersect_bodies(bodies.iter(), &options, &mut |r| all.push(*r));
        assert_eq!(all.len(), 2);

        all.clear();
        let options = options.with_skip_backfaces(true);
        let closest = ray.intersect_bodies(bodies.iter(), &options, &mut |r| all.push(*r)).unwrap();
        assert_eq!(all.len(), 1);
        assert!((closest.hit_point.y - 2.5).abs() < 1e-9);
        assert!(closest.hit_normal.almost_equals(Vec3::Y, 1e-9));
        assert!(closest.face_index.is_some());
    }

    #[test]
    fn test_closest_across_bodies_and_filters() {
        let mut bodies = SlotMap::with_key();
        let ground = bodies.insert(RigidBody::new(0.0).with_shape(Shape::plane()));
        let ball = bodies.insert(
            RigidBody::new(1.0)
                .with_shape(Shape::sphere(0.5))
                .with_position(Vec3::new(0.0, 3.0, 0.0))
                .with_collision_filter(2, u32::MAX),
        );
        let ray = Ray::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0));

        let hit = cast(&ray, &bodies, &RayOptions::default()).unwrap();
        assert_eq!(hit.body, ball);
        assert!((hit.distance - 6.5).abs() < 1e-9);

        let options = RayOptions::default().with_collision_filter(u32::MAX, 1);
        let hit = cast(&ray, &bodies, &options).unwrap();
        assert_eq!(hit.body, ground);
        assert!(hit.hit_point.almost_equals(Vec3::ZERO, 1e-9));
    }

    #[test]
    fn test_trimesh_and_heightfield() {
        let mesh = Trimesh::new(
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            vec![0, 2, 1, 0, 3, 2],
        )
        .unwrap();
        let field = Heightfield::new(vec![vec![1.0; 4]; 4], 1.0).unwrap();

        let mut bodies = SlotMap::with_key();
        bodies.insert(RigidBody::new(0.0).with_shape(Shape::trimesh(mesh)));
        let ray = Ray::new(Vec3::new(0.3, 5.0, 0.2), Vec3::new(0.3, -5.0, 0.2));
        let hit = cast(&ray, &bodies, &RayOptions::default()).unwrap();
        assert!(hit.hit_point.almost_equals(Vec3::new(0.3, 0.0, 0.2), 1e-9));

        let mut bodies = SlotMap::with_key();
        bodies.insert(RigidBody::new(0.0).with_shape(Shape::heightfield(field)));
        let ray = Ray::new(Vec3::new(1.5, 5.0, 1.2), Vec3::new(1.5, -5.0, 1.2));
        let hit = cast(&ray, &bodies, &RayOptions::default()).unwrap();
        assert!(hit.hit_point.almost_equals(Vec3::new(1.5, 1.0, 1.2), 1e-9));
        assert!(hit.hit_normal.almost_equals(Vec3::Y, 1e-9));
    }

    #[test]
    fn test_any_stops_early_and_misses() {
        let mut bodies = SlotMap::with_key();
        for k in 0..3 {
            bodies.insert(
                RigidBody::new(1.0)
                    .with_shape(Shape::sphere(0.5))
                    .with_position(Vec3::new(k as f64 * 2.0, 0.0, 0.0)),
            );
        }
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0));
        let mut calls = 0;
        let options = RayOptions::default().with_mode(RayMode::Any);
        assert!(ray.intersect_bodies(bodies.iter(), &options, &mut |_| calls += 1).is_some());
        assert_eq!(calls, 0);

        let miss = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(10.0, 3.0, 0.0));
        assert!(cast(&miss, &bodies, &RayOptions::default()).is_none());
        assert!(cast(&Ray::new(Vec3::ZERO, Vec3::ZERO), &bodies, &RayOptions::default()).is_none());
    }
}
