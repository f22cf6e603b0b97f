use crate::error::{PhysicsError, Result};
use crate::math::Vec3;

use super::aabb::Aabb;
use super::convex::ConvexPolyhedron;

/// A regular grid of height samples in the local XZ plane, heights along +Y.
///
/// Sample `data[i][j]` sits at local `(i * element_size, data[i][j], j * element_size)`.
/// Each grid cell is split into a lower and an upper triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    data: Vec<Vec<f64>>,
    element_size: f64,
    min_value: f64,
    max_value: f64,
}

impl Heightfield {
    pub fn new(data: Vec<Vec<f64>>, element_size: f64) -> Result<Self> {
        if !(element_size > 0.0 && element_size.is_finite()) {
            return Err(PhysicsError::InvalidHeightfield(format!(
                "element size must be positive, got {element_size}"
            )));
        }
        if data.len() < 2 {
            return Err(PhysicsError::InvalidHeightfield(
                "need at least 2 rows of samples".into(),
            ));
        }
        let columns = data[0].len();
        if columns < 2 {
            return Err(PhysicsError::InvalidHeightfield(
                "need at least 2 samples per row".into(),
            ));
        }
        if let Some(row) = data.iter().position(|r| r.len() != columns) {
            return Err(PhysicsError::InvalidHeightfield(format!(
                "row {row} has {} samples, expected {columns}",
                data[row].len()
            )));
        }
        if data.iter().flatten().any(|h| !h.is_finite()) {
            return Err(PhysicsError::InvalidHeightfield(
                "heights must be finite".into(),
            ));
        }

        let (min_value, max_value) = data
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)));

        Ok(Self {
            data,
            element_size,
            min_value,
            max_value,
        })
    }

    pub fn element_size(&self) -> f64 {
        self.element_size
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    /// Number of cells along local X.
    pub fn cells_x(&self) -> usize {
        self.data.len() - 1
    }

    /// Number of cells along local Z.
    pub fn cells_z(&self) -> usize {
        self.data[0].len() - 1
    }

    pub fn sample(&self, i: usize, j: usize) -> f64 {
        self.data[i][j]
    }

    fn vertex(&self, i: usize, j: usize) -> Vec3 {
        Vec3::new(
            i as f64 * self.element_size,
            self.data[i][j],
            j as f64 * self.element_size,
        )
    }

    pub fn local_aabb(&self) -> Aabb {
        Aabb::new(
            Vec3::new(0.0, self.min_value, 0.0),
            Vec3::new(
                self.cells_x() as f64 * self.element_size,
                self.max_value,
                self.cells_z() as f64 * self.element_size,
            ),
        )
    }

    pub fn bounding_radius(&self) -> f64 {
        let aabb = self.local_aabb();
        let mut radius: f64 = 0.0;
        for x in [aabb.min.x, aabb.max.x] {
            for y in [aabb.min.y, aabb.max.y] {
                for z in [aabb.min.z, aabb.max.z] {
                    radius = radius.max(Vec3::new(x, y, z).length());
                }
            }
        }
        radius
    }

    /// Inclusive cell index ranges `(i0, i1, j0, j1)` overlapping a local box,
    /// or `None` when the box misses the grid.
    pub fn cell_range(&self, aabb: Aabb) -> Option<(usize, usize, usize, usize)> {
        let bounds = self.local_aabb();
        if !aabb.overlaps(bounds) {
            return None;
        }
        let es = self.element_size;
        let clamp_cell = |v: f64, max: usize| -> usize {
            let c = (v / es).floor();
            if c <= 0.0 {
                0
            } else {
                (c as usize).min(max - 1)
            }
        };
        Some((
            clamp_cell(aabb.min.x, self.cells_x()),
            clamp_cell(aabb.max.x, self.cells_x()),
            clamp_cell(aabb.min.z, self.cells_z()),
            clamp_cell(aabb.max.z, self.cells_z()),
        ))
    }

    /// Lowest and highest sample of cell `(i, j)`.
    pub fn cell_height_range(&self, i: usize, j: usize) -> (f64, f64) {
        let samples = [
            self.data[i][j],
            self.data[i + 1][j],
            self.data[i][j + 1],
            self.data[i + 1][j + 1],
        ];
        samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }

    /// Corners of one of the two triangles of cell `(i, j)`, in local space.
    pub fn triangle(&self, i: usize, j: usize, upper: bool) -> [Vec3; 3] {
        if upper {
            [self.vertex(i + 1, j + 1), self.vertex(i, j + 1), self.vertex(i + 1, j)]
        } else {
            [self.vertex(i, j), self.vertex(i + 1, j), self.vertex(i, j + 1)]
        }
    }

    /// Triangular prism under one cell triangle, extruded down below the
    /// lowest sample of the field.
    ///
    /// Returns the hull centred on its own centroid and that centroid in the
    /// heightfield frame.
    pub fn convex_pillar(&self, i: usize, j: usize, upper: bool) -> Result<(ConvexPolyhedron, Vec3)> {
        let top = self.triangle(i, j, upper);
        let floor = self.min_value - self.element_size;
        let bottom = top.map(|v| Vec3::new(v.x, floor, v.z));

        let centroid = top
            .iter()
            .chain(bottom.iter())
            .fold(Vec3::ZERO, |acc, &v| acc + v)
            / 6.0;

        let vertices = top
            .iter()
            .chain(bottom.iter())
            .map(|&v| v - centroid)
            .collect();
        let faces = vec![
            vec![0, 1, 2],
            vec![3, 4, 5],
            vec![0, 1, 4, 3],
            vec![1, 2, 5, 4],
            vec![2, 0, 3, 5],
        ];

        Ok((ConvexPolyhedron::new(vertices, faces)?, centroid))
    }

    /// Height of the surface above local `(x, z)`, if inside the grid.
    pub fn height_at(&self, x: f64, z: f64) -> Option<f64> {
        let es = self.element_size;
        if x < 0.0 || z < 0.0 {
            return None;
        }
        let i = (x / es).floor() as usize;
        let j = (z / es).floor() as usize;
        if i > self.cells_x() || j > self.cells_z() {
            return None;
        }
        let i = i.min(self.cells_x() - 1);
        let j = j.min(self.cells_z() - 1);

        let u = x / es - i as f64;
        let v = z / es - j as f64;
        if u > 1.0 || v > 1.0 {
            return None;
        }

        // Barycentric interpolation inside the lower or upper triangle
        let h = if u + v <= 1.0 {
            let h00 = self.data[i][j];
            h00 + u * (self.data[i + 1][j] - h00) + v * (self.data[i][j + 1] - h00)
        } else {
            let h11 = self.data[i + 1][j + 1];
            h11 + (1.0 - u) * (self.data[i][j + 1] - h11) + (1.0 - v) * (self.data[i + 1][j] - h11)
        };
        Some(h)
    }
}
