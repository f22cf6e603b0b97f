use crate::error::{PhysicsError, Result};
use crate::math::{Quat, Vec3};

use super::aabb::Aabb;

/// Two edge directions closer than this (in `1 - |cos|`) count as parallel.
const PARALLEL_TOLERANCE: f64 = 1e-6;

/// A point produced by clipping an incident face against a reference hull.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPoint {
    /// World-space point on the incident hull
    pub point: Vec3,
    /// World-space outward normal of the reference face
    pub normal: Vec3,
    /// Signed distance below the reference face; never positive
    pub depth: f64,
}

/// Polygon buffers reused across [`ConvexPolyhedron::clip_against_hull`] calls.
#[derive(Debug, Clone, Default)]
pub struct ClipBuffers {
    reference: Vec<Vec3>,
    input: Vec<Vec3>,
    output: Vec<Vec3>,
}

impl ClipBuffers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A convex hull given by vertices and polygonal faces in its local frame.
///
/// Faces are stored counter-clockwise around their outward normal. The
/// constructor re-winds faces that arrive the other way round.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolyhedron {
    vertices: Vec<Vec3>,
    faces: Vec<Vec<usize>>,
    face_normals: Vec<Vec3>,
    unique_edges: Vec<Vec3>,
    unique_axes: Option<Vec<Vec3>>,
    bounding_radius: f64,
}

impl ConvexPolyhedron {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<usize>>) -> Result<Self> {
        if vertices.len() < 4 {
            return Err(PhysicsError::InvalidConvex(format!(
                "a hull needs at least 4 vertices, got {}",
                vertices.len()
            )));
        }

        let centroid =
            vertices.iter().fold(Vec3::ZERO, |acc, &v| acc + v) / vertices.len() as f64;
        let mut faces = faces;
        let mut face_normals = Vec::with_capacity(faces.len());

        for (index, face) in faces.iter_mut().enumerate() {
            if face.len() < 3 {
                return Err(PhysicsError::InvalidConvex(format!(
                    "face {index} has {} vertices",
                    face.len()
                )));
            }
            if let Some(&bad) = face.iter().find(|&&i| i >= vertices.len()) {
                return Err(PhysicsError::InvalidConvex(format!(
                    "face {index} references vertex {bad} of {}",
                    vertices.len()
                )));
            }

            let normal = newell_normal(&vertices, face).ok_or_else(|| {
                PhysicsError::InvalidConvex(format!("face {index} has zero area"))
            })?;

            let face_center =
                face.iter().fold(Vec3::ZERO, |acc, &i| acc + vertices[i]) / face.len() as f64;
            if normal.dot(face_center - centroid) < 0.0 {
                face.reverse();
                face_normals.push(-normal);
            } else {
                face_normals.push(normal);
            }
        }

        let mut hull = Self {
            vertices,
            faces,
            face_normals,
            unique_edges: Vec::new(),
            unique_axes: None,
            bounding_radius: 0.0,
        };
        hull.compute_edges();
        hull.update_bounding_radius();
        Ok(hull)
    }

    /// Axis-aligned box hull with its three face axes marked unique.
    pub fn cuboid(half_extents: Vec3) -> Self {
        let h = half_extents;
        let vertices = vec![
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        // Counter-clockwise seen from outside
        let faces = vec![
            vec![3, 2, 1, 0], // -z
            vec![4, 5, 6, 7], // +z
            vec![5, 4, 0, 1], // -y
            vec![2, 3, 7, 6], // +y
            vec![0, 4, 7, 3], // -x
            vec![1, 2, 6, 5], // +x
        ];
        let face_normals = vec![-Vec3::Z, Vec3::Z, -Vec3::Y, Vec3::Y, -Vec3::X, Vec3::X];

        let mut hull = Self {
            vertices,
            faces,
            face_normals,
            unique_edges: vec![Vec3::X, Vec3::Y, Vec3::Z],
            unique_axes: Some(vec![Vec3::X, Vec3::Y, Vec3::Z]),
            bounding_radius: 0.0,
        };
        hull.update_bounding_radius();
        hull
    }

    /// Cylinder (or truncated cone) along the local Y axis.
    pub fn cylinder(
        radius_top: f64,
        radius_bottom: f64,
        height: f64,
        segments: usize,
    ) -> Result<Self> {
        if segments < 3 {
            return Err(PhysicsError::InvalidConvex(format!(
                "a cylinder needs at least 3 segments, got {segments}"
            )));
        }
        if radius_top < 0.0 || radius_bottom < 0.0 || height <= 0.0 {
            return Err(PhysicsError::InvalidConvex(
                "cylinder radii must be non-negative and height positive".into(),
            ));
        }

        let half = height * 0.5;
        let mut vertices = Vec::with_capacity(segments * 2);
        for i in 0..segments {
            let theta = std::f64::consts::TAU * i as f64 / segments as f64;
            let (s, c) = theta.sin_cos();
            vertices.push(Vec3::new(radius_bottom * c, -half, radius_bottom * s));
            vertices.push(Vec3::new(radius_top * c, half, radius_top * s));
        }

        let mut faces = Vec::with_capacity(segments + 2);
        faces.push((0..segments).map(|i| 2 * i).collect::<Vec<_>>());
        faces.push((0..segments).map(|i| 2 * i + 1).collect::<Vec<_>>());
        for i in 0..segments {
            let j = (i + 1) % segments;
            faces.push(vec![2 * i, 2 * j, 2 * j + 1, 2 * i + 1]);
        }

        Self::new(vertices, faces)
    }

    /// Restricts face-normal SAT tests to these axes.
    pub fn with_unique_axes(mut self, axes: Vec<Vec3>) -> Self {
        self.unique_axes = Some(axes.into_iter().map(Vec3::normalize).collect());
        self
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn face_normals(&self) -> &[Vec3] {
        &self.face_normals
    }

    pub fn unique_edges(&self) -> &[Vec3] {
        &self.unique_edges
    }

    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    /// Volume by summing signed tetrahedra from the origin over each face fan.
    pub fn volume(&self) -> f64 {
        let mut six_volume = 0.0;
        for face in &self.faces {
            let a = self.vertices[face[0]];
            for k in 1..face.len() - 1 {
                let b = self.vertices[face[k]];
                let c = self.vertices[face[k + 1]];
                six_volume += a.dot(b.cross(c));
            }
        }
        six_volume.abs() / 6.0
    }

    /// True if `point` (local frame) lies inside or on every face plane.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.faces.iter().zip(&self.face_normals).all(|(face, n)| {
            n.dot(point - self.vertices[face[0]]) <= 0.0
        })
    }

    /// Replaces `out` with the world-space vertices of face `index`.
    pub fn world_face_into(&self, index: usize, position: Vec3, rotation: Quat, out: &mut Vec<Vec3>) {
        out.clear();
        out.extend(
            self.faces[index]
                .iter()
                .map(|&i| rotation.rotate_vec(self.vertices[i]) + position),
        );
    }

    /// True if the local-frame `point`, taken in the plane of face `index`,
    /// lies inside that face.
    pub fn face_contains(&self, index: usize, point: Vec3) -> bool {
        let face = &self.faces[index];
        polygon_contains(face.len(), |k| self.vertices[face[k]], self.face_normals[index], point)
    }

    fn compute_edges(&mut self) {
        let mut edges: Vec<Vec3> = Vec::new();
        for face in &self.faces {
            for k in 0..face.len() {
                let a = self.vertices[face[k]];
                let b = self.vertices[face[(k + 1) % face.len()]];
                let Some(dir) = (b - a).try_normalize() else {
                    continue;
                };
                let known = edges
                    .iter()
                    .any(|e| 1.0 - e.dot(dir).abs() < PARALLEL_TOLERANCE);
                if !known {
                    edges.push(dir);
                }
            }
        }
        self.unique_edges = edges;
    }

    fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .vertices
            .iter()
            .map(|v| v.length_squared())
            .fold(0.0, f64::max)
            .sqrt();
    }

    /// Interval of the hull's world-space projection onto `axis`.
    pub fn project(&self, axis: Vec3, position: Vec3, rotation: Quat) -> (f64, f64) {
        let local_axis = rotation.inverse_rotate_vec(axis);
        let offset = position.dot(axis);
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in &self.vertices {
            let d = v.dot(local_axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min + offset, max + offset)
    }

    /// Overlap depth of the two hulls along `axis`, or `None` when separated.
    #[allow(clippy::too_many_arguments)]
    pub fn test_sep_axis(
        &self,
        axis: Vec3,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<f64> {
        let (min_a, max_a) = self.project(axis, pos_a, quat_a);
        let (min_b, max_b) = other.project(axis, pos_b, quat_b);
        if max_a < min_b || max_b < min_a {
            return None;
        }
        Some((max_a - min_b).min(max_b - min_a))
    }

    /// Separating-axis test over face normals of both hulls and the cross
    /// products of their unique edges.
    ///
    /// Returns the axis of least penetration oriented from `self` towards
    /// `other`, or `None` if some axis separates the hulls. Near-parallel edge
    /// pairs are skipped and leave the best axis found so far in place.
    pub fn find_separating_axis(
        &self,
        other: &ConvexPolyhedron,
        pos_a: Vec3,
        quat_a: Quat,
        pos_b: Vec3,
        quat_b: Quat,
    ) -> Option<Vec3> {
        let mut best_depth = f64::INFINITY;
        let mut best_axis = Vec3::Y;

        let mut consider = |axis: Vec3| -> bool {
            match self.test_sep_axis(axis, other, pos_a, quat_a, pos_b, quat_b) {
                None => false,
                Some(depth) => {
                    if depth < best_depth {
                        best_depth = depth;
                        best_axis = axis;
                    }
                    true
                }
            }
        };

        for n in self.sat_axes() {
            if !consider(quat_a.rotate_vec(*n)) {
                return None;
            }
        }
        for n in other.sat_axes() {
            if !consider(quat_b.rotate_vec(*n)) {
                return None;
            }
        }

        for edge_a in &self.unique_edges {
            let world_a = quat_a.rotate_vec(*edge_a);
            for edge_b in &other.unique_edges {
                let world_b = quat_b.rotate_vec(*edge_b);
                let cross = world_a.cross(world_b);
                if cross.length_squared() < 1e-12 {
                    continue;
                }
                if !consider(cross.normalize()) {
                    return None;
                }
            }
        }

        if (pos_b - pos_a).dot(best_axis) < 0.0 {
            best_axis = -best_axis;
        }
        Some(best_axis)
    }

    fn sat_axes(&self) -> &[Vec3] {
        self.unique_axes.as_deref().unwrap_or(&self.face_normals)
    }

    /// Clips the face of `other` most opposed to `axis` against `self`.
    ///
    /// `axis` points from `self` to `other`. Only points at or below the
    /// reference face survive; depths are clamped into `[min_dist, max_dist]`.
    #[allow(clippy::too_many_arguments)]
    pub fn clip_against_hull(
        &self,
        pos_a: Vec3,
        quat_a: Quat,
        other: &ConvexPolyhedron,
        pos_b: Vec3,
        quat_b: Quat,
        axis: Vec3,
        min_dist: f64,
        max_dist: f64,
        buffers: &mut ClipBuffers,
        out: &mut Vec<ClipPoint>,
    ) {
        let mut incident = None;
        let mut lowest = f64::INFINITY;
        for (i, n) in other.face_normals.iter().enumerate() {
            let d = quat_b.rotate_vec(*n).dot(axis);
            if d < lowest {
                lowest = d;
                incident = Some(i);
            }
        }

        if let Some(face) = incident {
            other.world_face_into(face, pos_b, quat_b, &mut buffers.input);
            self.clip_incident_against_hull(axis, pos_a, quat_a, buffers, min_dist, max_dist, out);
        }
    }

    /// Sutherland-Hodgman clip of the world-space polygon in `buffers.input`
    /// against the side planes of this hull's face best aligned with `axis`.
    #[allow(clippy::too_many_arguments)]
    fn clip_incident_against_hull(
        &self,
        axis: Vec3,
        pos_a: Vec3,
        quat_a: Quat,
        buffers: &mut ClipBuffers,
        min_dist: f64,
        max_dist: f64,
        out: &mut Vec<ClipPoint>,
    ) {
        let mut reference = None;
        let mut highest = f64::NEG_INFINITY;
        for (i, n) in self.face_normals.iter().enumerate() {
            let d = quat_a.rotate_vec(*n).dot(axis);
            if d > highest {
                highest = d;
                reference = Some(i);
            }
        }
        let Some(reference) = reference else {
            return;
        };

        self.world_face_into(reference, pos_a, quat_a, &mut buffers.reference);
        let ClipBuffers {
            reference: polygon,
            input,
            output,
        } = buffers;
        let ref_normal = quat_a.rotate_vec(self.face_normals[reference]);
        let center = polygon.iter().fold(Vec3::ZERO, |acc, &v| acc + v) / polygon.len() as f64;

        output.clear();
        for k in 0..polygon.len() {
            let a = polygon[k];
            let b = polygon[(k + 1) % polygon.len()];
            let Some(mut side) = (b - a).cross(ref_normal).try_normalize() else {
                continue;
            };
            if side.dot(center - a) > 0.0 {
                side = -side;
            }
            clip_face_against_plane(input, output, side, -side.dot(a));
            std::mem::swap(input, output);
            output.clear();
            if input.is_empty() {
                return;
            }
        }

        let plane_constant = -ref_normal.dot(polygon[0]);
        for &point in input.iter() {
            let depth = (ref_normal.dot(point) + plane_constant).max(min_dist);
            if depth <= max_dist && depth <= 0.0 {
                out.push(ClipPoint {
                    point,
                    normal: ref_normal,
                    depth,
                });
            }
        }
    }
}

/// Keeps the part of `input` on the negative side of `n . x + constant = 0`.
pub fn clip_face_against_plane(input: &[Vec3], output: &mut Vec<Vec3>, n: Vec3, constant: f64) {
    let Some(&last) = input.last() else {
        return;
    };

    let mut first = last;
    let mut first_dist = n.dot(first) + constant;

    for &current in input {
        let current_dist = n.dot(current) + constant;
        if first_dist < 0.0 {
            if current_dist < 0.0 {
                output.push(current);
            } else {
                output.push(first.lerp(current, first_dist / (first_dist - current_dist)));
            }
        } else if current_dist < 0.0 {
            output.push(first.lerp(current, first_dist / (first_dist - current_dist)));
            output.push(current);
        }
        first = current;
        first_dist = current_dist;
    }
}

/// True if `point` projects inside the convex polygon `vertices` with normal `normal`.
pub fn point_in_polygon(vertices: &[Vec3], normal: Vec3, point: Vec3) -> bool {
    polygon_contains(vertices.len(), |k| vertices[k], normal, point)
}

fn polygon_contains(len: usize, vertex: impl Fn(usize) -> Vec3, normal: Vec3, point: Vec3) -> bool {
    let mut sign = 0.0;
    for k in 0..len {
        let a = vertex(k);
        let b = vertex((k + 1) % len);
        let side = (b - a).cross(normal).dot(point - a);
        if sign == 0.0 {
            sign = side;
        } else if side * sign < 0.0 && side.abs() > 1e-12 {
            return false;
        }
    }
    true
}

fn newell_normal(vertices: &[Vec3], face: &[usize]) -> Option<Vec3> {
    let mut n = Vec3::ZERO;
    for k in 0..face.len() {
        let a = vertices[face[k]];
        let b = vertices[face[(k + 1) % face.len()]];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n.try_normalize()
}
