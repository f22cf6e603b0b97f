use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::material::MaterialHandle;
use crate::math::{Quat, Vec3};

use super::aabb::Aabb;
use super::convex::ConvexPolyhedron;
use super::heightfield::Heightfield;
use super::trimesh::Trimesh;

/// The type tag of a collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    Sphere,
    Plane,
    Box,
    ConvexPolyhedron,
    Cylinder,
    Heightfield,
    Trimesh,
    Particle,
}

/// A sphere centred on the shape origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub radius: f64,
}

/// The infinite half-space below the local XZ plane; its normal is local +Y.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane;

impl Plane {
    pub const LOCAL_NORMAL: Vec3 = Vec3::Y;
}

/// A cuboid with its convex hull kept alongside for SAT and clipping.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxShape {
    half_extents: Vec3,
    hull: ConvexPolyhedron,
}

impl BoxShape {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            hull: ConvexPolyhedron::cuboid(half_extents),
        }
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    pub fn hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }
}

/// A cylinder (or truncated cone) along local Y, collided as its hull.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    pub radius_top: f64,
    pub radius_bottom: f64,
    pub height: f64,
    pub segments: usize,
    hull: ConvexPolyhedron,
}

impl Cylinder {
    pub fn new(radius_top: f64, radius_bottom: f64, height: f64, segments: usize) -> Result<Self> {
        Ok(Self {
            radius_top,
            radius_bottom,
            height,
            segments,
            hull: ConvexPolyhedron::cylinder(radius_top, radius_bottom, height, segments)?,
        })
    }

    pub fn hull(&self) -> &ConvexPolyhedron {
        &self.hull
    }
}

/// Local-frame geometry of a shape.
#[derive(Debug, Clone)]
pub enum Geometry {
    Sphere(Sphere),
    Plane(Plane),
    Box(BoxShape),
    ConvexPolyhedron(ConvexPolyhedron),
    Cylinder(Cylinder),
    Heightfield(Heightfield),
    Trimesh(Trimesh),
    Particle,
}

impl Geometry {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Geometry::Sphere(_) => ShapeType::Sphere,
            Geometry::Plane(_) => ShapeType::Plane,
            Geometry::Box(_) => ShapeType::Box,
            Geometry::ConvexPolyhedron(_) => ShapeType::ConvexPolyhedron,
            Geometry::Cylinder(_) => ShapeType::Cylinder,
            Geometry::Heightfield(_) => ShapeType::Heightfield,
            Geometry::Trimesh(_) => ShapeType::Trimesh,
            Geometry::Particle => ShapeType::Particle,
        }
    }

    /// The hull used by the convex routines, if this geometry has one.
    pub fn hull(&self) -> Option<&ConvexPolyhedron> {
        match self {
            Geometry::Box(b) => Some(b.hull()),
            Geometry::ConvexPolyhedron(c) => Some(c),
            Geometry::Cylinder(c) => Some(c.hull()),
            _ => None,
        }
    }

    /// Radius of a sphere about the local origin enclosing the geometry.
    pub fn bounding_sphere_radius(&self) -> f64 {
        match self {
            Geometry::Sphere(s) => s.radius,
            Geometry::Plane(_) => f64::INFINITY,
            Geometry::Box(b) => b.half_extents().length(),
            Geometry::ConvexPolyhedron(c) => c.bounding_radius(),
            Geometry::Cylinder(c) => c.hull().bounding_radius(),
            Geometry::Heightfield(h) => h.bounding_radius(),
            Geometry::Trimesh(t) => t.bounding_radius(),
            Geometry::Particle => 0.0,
        }
    }

    /// Local-frame AABB; planes have none.
    pub fn local_aabb(&self) -> Option<Aabb> {
        match self {
            Geometry::Sphere(s) => Some(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(s.radius))),
            Geometry::Plane(_) => None,
            Geometry::Box(b) => Some(Aabb::from_center_half_extents(Vec3::ZERO, b.half_extents())),
            Geometry::ConvexPolyhedron(c) => Some(c.local_aabb()),
            Geometry::Cylinder(c) => Some(c.hull().local_aabb()),
            Geometry::Heightfield(h) => Some(h.local_aabb()),
            Geometry::Trimesh(t) => Some(t.local_aabb()),
            Geometry::Particle => Some(Aabb::new(Vec3::ZERO, Vec3::ZERO)),
        }
    }

    /// World-frame AABB for the geometry posed at `position`, `rotation`.
    ///
    /// A plane is unbounded except along its normal when that normal is
    /// aligned with a world axis.
    pub fn world_aabb(&self, position: Vec3, rotation: Quat) -> Aabb {
        match self {
            Geometry::Sphere(s) => Aabb::from_center_half_extents(position, Vec3::splat(s.radius)),
            Geometry::Plane(_) => plane_world_aabb(position, rotation),
            Geometry::ConvexPolyhedron(c) => world_hull_aabb(c, position, rotation),
            Geometry::Cylinder(c) => world_hull_aabb(c.hull(), position, rotation),
            Geometry::Particle => Aabb::new(position, position),
            other => match other.local_aabb() {
                Some(local) => local.transformed(position, rotation),
                None => Aabb::EMPTY,
            },
        }
    }

    /// Diagonal of the local inertia tensor for a given mass.
    pub fn calculate_local_inertia(&self, mass: f64) -> Vec3 {
        match self {
            Geometry::Sphere(s) => Vec3::splat(0.4 * mass * s.radius * s.radius),
            Geometry::Box(b) => box_inertia(b.half_extents(), mass),
            Geometry::Cylinder(c) if (c.radius_top - c.radius_bottom).abs() < 1e-12 => {
                let r2 = c.radius_top * c.radius_top;
                let h2 = c.height * c.height;
                let side = mass * (3.0 * r2 + h2) / 12.0;
                Vec3::new(side, 0.5 * mass * r2, side)
            }
            Geometry::Plane(_) | Geometry::Heightfield(_) | Geometry::Particle => Vec3::ZERO,
            other => match other.local_aabb() {
                Some(aabb) => box_inertia(aabb.half_extents(), mass),
                None => Vec3::ZERO,
            },
        }
    }

    pub fn volume(&self) -> f64 {
        match self {
            Geometry::Sphere(s) => 4.0 / 3.0 * std::f64::consts::PI * s.radius.powi(3),
            Geometry::Box(b) => {
                let h = b.half_extents();
                8.0 * h.x * h.y * h.z
            }
            Geometry::ConvexPolyhedron(c) => c.volume(),
            Geometry::Cylinder(c) => c.hull().volume(),
            Geometry::Trimesh(t) => t.volume(),
            Geometry::Plane(_) => f64::INFINITY,
            Geometry::Heightfield(_) | Geometry::Particle => 0.0,
        }
    }
}

/// Inertia diagonal of a solid box with the given half extents.
pub fn box_inertia(half_extents: Vec3, mass: f64) -> Vec3 {
    let e = half_extents * 2.0;
    let (x2, y2, z2) = (e.x * e.x, e.y * e.y, e.z * e.z);
    Vec3::new(
        mass / 12.0 * (y2 + z2),
        mass / 12.0 * (x2 + z2),
        mass / 12.0 * (x2 + y2),
    )
}

fn world_hull_aabb(hull: &ConvexPolyhedron, position: Vec3, rotation: Quat) -> Aabb {
    hull.vertices()
        .iter()
        .fold(Aabb::EMPTY, |aabb, &v| aabb.expand_to_include(rotation.rotate_vec(v) + position))
}

fn plane_world_aabb(position: Vec3, rotation: Quat) -> Aabb {
    let n = rotation.rotate_vec(Plane::LOCAL_NORMAL);
    let mut aabb = Aabb::new(Vec3::splat(f64::NEG_INFINITY), Vec3::splat(f64::INFINITY));
    for axis in 0..3 {
        if (n[axis] - 1.0).abs() < 1e-12 {
            aabb.max[axis] = position[axis];
        } else if (n[axis] + 1.0).abs() < 1e-12 {
            aabb.min[axis] = position[axis];
        }
    }
    aabb
}

/// A collision shape: geometry plus filtering, material and response flags.
///
/// The bounding sphere radius is cached and refreshed whenever the geometry
/// is replaced through [`Shape::set_geometry`].
#[derive(Debug, Clone)]
pub struct Shape {
    geometry: Geometry,
    bounding_sphere_radius: f64,
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// When false, overlaps are reported but produce no contact equations
    pub collision_response: bool,
    pub material: Option<MaterialHandle>,
}

impl Shape {
    pub fn new(geometry: Geometry) -> Self {
        let bounding_sphere_radius = geometry.bounding_sphere_radius();
        Self {
            geometry,
            bounding_sphere_radius,
            collision_filter_group: 1,
            collision_filter_mask: u32::MAX,
            collision_response: true,
            material: None,
        }
    }

    pub fn sphere(radius: f64) -> Self {
        Self::new(Geometry::Sphere(Sphere { radius }))
    }

    pub fn plane() -> Self {
        Self::new(Geometry::Plane(Plane))
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(Geometry::Box(BoxShape::new(half_extents)))
    }

    pub fn convex(hull: ConvexPolyhedron) -> Self {
        Self::new(Geometry::ConvexPolyhedron(hull))
    }

    pub fn cylinder(radius_top: f64, radius_bottom: f64, height: f64, segments: usize) -> Result<Self> {
        Ok(Self::new(Geometry::Cylinder(Cylinder::new(
            radius_top,
            radius_bottom,
            height,
            segments,
        )?)))
    }

    pub fn heightfield(heightfield: Heightfield) -> Self {
        Self::new(Geometry::Heightfield(heightfield))
    }

    pub fn trimesh(trimesh: Trimesh) -> Self {
        Self::new(Geometry::Trimesh(trimesh))
    }

    pub fn particle() -> Self {
        Self::new(Geometry::Particle)
    }

    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_collision_response(mut self, collision_response: bool) -> Self {
        self.collision_response = collision_response;
        self
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.bounding_sphere_radius = geometry.bounding_sphere_radius();
        self.geometry = geometry;
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        self.geometry.shape_type()
    }

    #[inline]
    pub fn bounding_sphere_radius(&self) -> f64 {
        self.bounding_sphere_radius
    }

    /// Both shapes' group bits must appear in the other's mask.
    #[inline]
    pub fn can_collide_with(&self, other: &Shape) -> bool {
        (self.collision_filter_group & other.collision_filter_mask) != 0
            && (other.collision_filter_group & self.collision_filter_mask) != 0
    }
}
