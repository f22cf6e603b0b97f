//! # impulse3d
//!
//! A discrete-time 3D rigid body physics engine.
//!
//! ## Features
//!
//! - **Rigid Body Dynamics**: dynamic, static and kinematic bodies made of
//!   offset shapes, with damping, axis factors and a sleep state machine
//! - **Collision Shapes**: sphere, plane, box, convex polyhedron, cylinder,
//!   particle, heightfield and triangle mesh
//! - **Broad Phase**: naive all-pairs or sweep-and-prune
//! - **Narrow Phase**: a static table of shape-pair routines built on
//!   separating-axis tests and face clipping
//! - **Constraint Solver**: SPOOK-stabilized Gauss-Seidel over contact,
//!   friction and user constraint equations
//! - **Queries**: ray casts and AABB queries, plus contact and sleep events
//!
//! ## Quick Start
//!
//! ```rust
//! use impulse3d::prelude::*;
//!
//! let mut world = World::default();
//!
//! // Static ground plane through the origin, facing +Y
//! world.add_body(RigidBody::new(0.0).with_shape(Shape::plane()));
//!
//! let ball = world.add_body(
//!     RigidBody::new(1.0)
//!         .with_shape(Shape::sphere(0.5))
//!         .with_position(Vec3::new(0.0, 5.0, 0.0)),
//! );
//!
//! let dt = 1.0 / 60.0;
//! for _ in 0..300 {
//!     world.step(dt);
//! }
//! let y = world.body(ball).map(|b| b.position.y).unwrap_or_default();
//! assert!((y - 0.5).abs() < 0.05);
//! ```

pub mod collision;
pub mod constraints;
pub mod dynamics;
pub mod error;
pub mod geometry;
pub mod material;
pub mod math;
pub mod raycast;
pub mod solver;
pub mod world;

pub use error::{PhysicsError, Result};
pub use world::{World, WorldConfig, WorldEvent};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collision::{BroadphaseKind, ContactPoint};
    pub use crate::constraints::{
        Constraint, ConstraintHandle, DistanceConstraint, Equation, HingeConstraint, LockConstraint,
        PointToPointConstraint, Spring,
    };
    pub use crate::dynamics::{BodyHandle, BodyType, RigidBody, SleepState};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::geometry::{Aabb, ConvexPolyhedron, Heightfield, Shape, ShapeType, Trimesh};
    pub use crate::material::{ContactMaterial, ContactParams, Material, MaterialHandle};
    pub use crate::math::{Mat3, Quat, Transform, Vec3};
    pub use crate::raycast::{Ray, RayMode, RayOptions, RaycastResult};
    pub use crate::solver::SolverConfig;
    pub use crate::world::{World, WorldConfig, WorldEvent};
}
