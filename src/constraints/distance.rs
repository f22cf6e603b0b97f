use crate::dynamics::{BodyHandle, RigidBody};
use crate::math::Vec3;

use super::{Constraint, Equation, EquationKind, DEFAULT_MAX_FORCE};

/// Keeps the centres of two bodies a fixed distance apart.
#[derive(Debug, Clone)]
pub struct DistanceConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    pub distance: f64,
    pub collide_connected: bool,
    equations: Vec<Equation>,
}

impl DistanceConstraint {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, distance: f64) -> Self {
        Self::with_max_force(body_a, body_b, distance, DEFAULT_MAX_FORCE)
    }

    pub fn with_max_force(body_a: BodyHandle, body_b: BodyHandle, distance: f64, max_force: f64) -> Self {
        let eq = Equation::new(
            EquationKind::Contact {
                normal: Vec3::X,
                ri: Vec3::ZERO,
                rj: Vec3::ZERO,
                restitution: 0.0,
            },
            body_a,
            body_b,
            -max_force,
            max_force,
        );
        Self {
            body_a,
            body_b,
            distance,
            collide_connected: true,
            equations: vec![eq],
        }
    }

    /// Uses the bodies' current separation as the target distance.
    pub fn from_bodies(
        handle_a: BodyHandle,
        body_a: &RigidBody,
        handle_b: BodyHandle,
        body_b: &RigidBody,
    ) -> Self {
        Self::new(handle_a, handle_b, body_a.position.distance(body_b.position))
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }
}

impl Constraint for DistanceConstraint {
    constraint_accessors!();

    fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        let half = self.distance * 0.5;
        // Coincident centres keep the last direction
        for eq in &mut self.equations {
            if let EquationKind::Contact { normal, ri, rj, .. } = &mut eq.kind {
                if let Some(n) = (body_b.position - body_a.position).try_normalize() {
                    *normal = n;
                }
                *ri = *normal * half;
                *rj = *normal * -half;
            }
        }
    }
}
