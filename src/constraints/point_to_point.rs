use crate::dynamics::{BodyHandle, RigidBody};
use crate::math::Vec3;

use super::{Constraint, Equation, EquationKind, DEFAULT_MAX_FORCE};

/// Three equations along the world axes joining `pivot_a` on body A to
/// `pivot_b` on body B.
pub(crate) fn pivot_equations(body_a: BodyHandle, body_b: BodyHandle, max_force: f64) -> [Equation; 3] {
    [Vec3::X, Vec3::Y, Vec3::Z].map(|normal| {
        Equation::new(
            EquationKind::Contact {
                normal,
                ri: Vec3::ZERO,
                rj: Vec3::ZERO,
                restitution: 0.0,
            },
            body_a,
            body_b,
            -max_force,
            max_force,
        )
    })
}

/// Points the pivot equations at the current world-space pivot offsets.
pub(crate) fn update_pivot_equations(
    equations: &mut [Equation],
    body_a: &RigidBody,
    pivot_a: Vec3,
    body_b: &RigidBody,
    pivot_b: Vec3,
) {
    let world_ri = body_a.vector_to_world_frame(pivot_a);
    let world_rj = body_b.vector_to_world_frame(pivot_b);
    for eq in equations {
        if let EquationKind::Contact { ri, rj, .. } = &mut eq.kind {
            *ri = world_ri;
            *rj = world_rj;
        }
    }
}

/// Connects two bodies at a shared point, leaving rotation free.
///
/// Pivots are given in each body's local frame.
#[derive(Debug, Clone)]
pub struct PointToPointConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    pub pivot_a: Vec3,
    pub pivot_b: Vec3,
    pub collide_connected: bool,
    equations: Vec<Equation>,
}

impl PointToPointConstraint {
    pub fn new(body_a: BodyHandle, pivot_a: Vec3, body_b: BodyHandle, pivot_b: Vec3) -> Self {
        Self::with_max_force(body_a, pivot_a, body_b, pivot_b, DEFAULT_MAX_FORCE)
    }

    pub fn with_max_force(
        body_a: BodyHandle,
        pivot_a: Vec3,
        body_b: BodyHandle,
        pivot_b: Vec3,
        max_force: f64,
    ) -> Self {
        Self {
            body_a,
            body_b,
            pivot_a,
            pivot_b,
            collide_connected: true,
            equations: pivot_equations(body_a, body_b, max_force).to_vec(),
        }
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }
}

impl Constraint for PointToPointConstraint {
    constraint_accessors!();

    fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        update_pivot_equations(&mut self.equations, body_a, self.pivot_a, body_b, self.pivot_b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::handles;
    use crate::math::Quat;

    #[test]
    fn test_update_rotates_pivots() {
        let (a, b) = handles();
        let body_a = RigidBody::new(1.0).with_rotation(Quat::from_axis_angle(Vec3::Z, crate::math::consts::FRAC_PI_2));
        let body_b = RigidBody::new(1.0).with_position(Vec3::new(0.0, 2.0, 0.0));
        let mut c = PointToPointConstraint::new(a, Vec3::X, b, Vec3::new(0.0, -1.0, 0.0));
        c.update(&body_a, &body_b);

        assert_eq!(c.equations().len(), 3);
        for eq in c.equations() {
            let EquationKind::Contact { ri, rj, .. } = eq.kind else {
                panic!("pivot equations are contact-style");
            };
            // +X rotated a quarter turn about Z is +Y
            assert!(ri.almost_equals(Vec3::Y, 1e-12));
            assert!(rj.almost_equals(-Vec3::Y, 1e-12));
            assert_eq!(eq.min_force, -DEFAULT_MAX_FORCE);
        }
    }

    #[test]
    fn test_disable_switches_off_every_equation() {
        let (a, b) = handles();
        let mut c = PointToPointConstraint::new(a, Vec3::ZERO, b, Vec3::ZERO);
        c.disable();
        assert!(c.equations().iter().all(|eq| !eq.enabled));
        c.enable();
        assert!(c.equations().iter().all(|eq| eq.enabled));
    }
}
