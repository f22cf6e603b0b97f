/// Implements the boilerplate half of [`Constraint`] for a struct with
/// `body_a`, `body_b`, `collide_connected` and `equations` fields.
macro_rules! constraint_accessors {
    () => {
        fn body_a(&self) -> $crate::dynamics::BodyHandle {
            self.body_a
        }

        fn body_b(&self) -> $crate::dynamics::BodyHandle {
            self.body_b
        }

        fn collide_connected(&self) -> bool {
            self.collide_connected
        }

        fn equations(&self) -> &[$crate::constraints::Equation] {
            &self.equations
        }

        fn equations_mut(&mut self) -> &mut [$crate::constraints::Equation] {
            &mut self.equations
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

mod distance;
mod equation;
mod hinge;
mod lock;
mod point_to_point;
mod spring;

use std::any::Any;
use std::fmt;

use slotmap::new_key_type;

use crate::dynamics::{BodyHandle, RigidBody};

pub use distance::DistanceConstraint;
pub use equation::{Equation, EquationKind, JacobianElement};
pub use hinge::HingeConstraint;
pub use lock::LockConstraint;
pub use point_to_point::PointToPointConstraint;
pub use spring::Spring;

new_key_type! {
    /// Stable handle of a constraint inside a [`World`](crate::World).
    pub struct ConstraintHandle;
    /// Stable handle of a spring inside a [`World`](crate::World).
    pub struct SpringHandle;
}

/// A user constraint between two bodies, expressed as a set of equations.
///
/// Before every solve the world calls [`Constraint::update`] so the
/// equations can refresh their world-space anchors and axes.
pub trait Constraint: Any + fmt::Debug {
    fn body_a(&self) -> BodyHandle;

    fn body_b(&self) -> BodyHandle;

    /// Whether the two bodies still collide with each other
    fn collide_connected(&self) -> bool;

    fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody);

    fn equations(&self) -> &[Equation];

    fn equations_mut(&mut self) -> &mut [Equation];

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn enable(&mut self) {
        for eq in self.equations_mut() {
            eq.enabled = true;
        }
    }

    fn disable(&mut self) {
        for eq in self.equations_mut() {
            eq.enabled = false;
        }
    }
}

/// Default force cap of constraint equations.
pub const DEFAULT_MAX_FORCE: f64 = 1e6;
