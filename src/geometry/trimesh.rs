use crate::error::{PhysicsError, Result};
use crate::math::Vec3;

use super::aabb::Aabb;
use super::bvh::Bvh;

/// An indexed triangle mesh with a per-triangle AABB tree.
///
/// Triangles with zero area keep their slot but carry a zero normal; the
/// collision and ray routines skip them.
#[derive(Debug, Clone)]
pub struct Trimesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
    tree: Bvh,
    aabb: Aabb,
    bounding_radius: f64,
}

impl Trimesh {
    /// Builds a mesh from a vertex buffer and a flat triangle-list index buffer.
    pub fn new(vertices: Vec<Vec3>, indices: Vec<u32>) -> Result<Self> {
        if indices.is_empty() || indices.len() % 3 != 0 {
            return Err(PhysicsError::InvalidTrimesh(format!(
                "index buffer length {} is not a non-empty multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(PhysicsError::InvalidTrimesh(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        let triangles: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        let mut normals = Vec::with_capacity(triangles.len());
        let mut boxes = Vec::with_capacity(triangles.len());
        for t in &triangles {
            let [a, b, c] = t.map(|i| vertices[i as usize]);
            normals.push((b - a).cross(c - a).normalize());
            boxes.push(Aabb::from_points(&[a, b, c]));
        }

        let tree = Bvh::from_aabbs(&boxes);
        let aabb = Aabb::from_points(&vertices);
        let bounding_radius = vertices
            .iter()
            .map(|v| v.length_squared())
            .fold(0.0, f64::max)
            .sqrt();

        Ok(Self {
            vertices,
            triangles,
            normals,
            tree,
            aabb,
            bounding_radius,
        })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Local-space corners of triangle `index`.
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        self.triangles[index].map(|i| self.vertices[i as usize])
    }

    /// Unit normal of triangle `index`, zero if the triangle is degenerate.
    pub fn normal(&self, index: usize) -> Vec3 {
        self.normals[index]
    }

    pub fn is_degenerate(&self, index: usize) -> bool {
        self.normals[index] == Vec3::ZERO
    }

    pub fn local_aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// Appends the triangles whose boxes overlap a local-space AABB.
    pub fn triangles_in_aabb(&self, aabb: Aabb, out: &mut Vec<u32>) {
        self.tree.query_aabb(aabb, |id| out.push(id));
    }

    /// Calls `visit` with the triangles whose boxes the local-space segment
    /// may cross.
    pub fn triangles_along_ray(&self, from: Vec3, to: Vec3, visit: impl FnMut(u32)) {
        self.tree.query_ray(from, to - from, 1.0, visit);
    }

    /// Enclosed volume of a closed, consistently wound mesh.
    pub fn volume(&self) -> f64 {
        let six_volume: f64 = (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle(i);
                a.dot(b.cross(c))
            })
            .sum();
        six_volume.abs() / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Trimesh {
        Trimesh::new(
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ],
            vec![0, 2, 1, 0, 3, 2],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_indices() {
        let verts = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(Trimesh::new(verts.clone(), vec![0, 1]).is_err());
        assert!(Trimesh::new(verts.clone(), vec![0, 1, 3]).is_err());
        assert!(Trimesh::new(verts, vec![]).is_err());
    }

    #[test]
    fn test_normals_and_degenerates() {
        let mesh = quad();
        assert!(mesh.normal(0).almost_equals(Vec3::Y, 1e-12));
        assert!(mesh.normal(1).almost_equals(Vec3::Y, 1e-12));

        let degenerate = Trimesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0], vec![0, 1, 2]).unwrap();
        assert!(degenerate.is_degenerate(0));
    }

    #[test]
    fn test_triangle_queries() {
        let mesh = quad();
        let mut hits = Vec::new();
        mesh.triangles_in_aabb(Aabb::new(Vec3::new(0.5, -0.1, -0.9), Vec3::new(0.9, 0.1, -0.8)), &mut hits);
        assert!(hits.contains(&0));

        let mut along = Vec::new();
        mesh.triangles_along_ray(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0), |id| along.push(id));
        assert_eq!(along.len(), 2);
    }
}
