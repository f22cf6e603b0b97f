mod aabb;
mod bvh;
mod convex;
mod heightfield;
mod shape;
mod trimesh;

pub use aabb::Aabb;
pub use bvh::Bvh;
pub use convex::{clip_face_against_plane, point_in_polygon, ClipBuffers, ClipPoint, ConvexPolyhedron};
pub use heightfield::Heightfield;
pub use shape::{box_inertia, BoxShape, Cylinder, Geometry, Plane, Shape, ShapeType, Sphere};
pub use trimesh::Trimesh;
