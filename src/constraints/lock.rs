use crate::dynamics::{BodyHandle, RigidBody};
use crate::math::Vec3;

use super::point_to_point::{pivot_equations, update_pivot_equations};
use super::{Constraint, Equation, EquationKind, DEFAULT_MAX_FORCE};

/// Welds two bodies together in their current relative pose.
///
/// A shared point halfway between the centres is held by three pivot
/// equations; three rotational equations keep each body's initial basis
/// vectors perpendicular to the other's.
#[derive(Debug, Clone)]
pub struct LockConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    pivot_a: Vec3,
    pivot_b: Vec3,
    // Local basis pairs (axis on A, axis on B) that must stay perpendicular
    axes: [(Vec3, Vec3); 3],
    pub collide_connected: bool,
    equations: Vec<Equation>,
}

impl LockConstraint {
    pub fn new(handle_a: BodyHandle, body_a: &RigidBody, handle_b: BodyHandle, body_b: &RigidBody) -> Self {
        Self::with_max_force(handle_a, body_a, handle_b, body_b, DEFAULT_MAX_FORCE)
    }

    pub fn with_max_force(
        handle_a: BodyHandle,
        body_a: &RigidBody,
        handle_b: BodyHandle,
        body_b: &RigidBody,
        max_force: f64,
    ) -> Self {
        let halfway = (body_a.position + body_b.position) * 0.5;
        let pivot_a = body_a.point_to_local_frame(halfway);
        let pivot_b = body_b.point_to_local_frame(halfway);

        let local = |body: &RigidBody, v: Vec3| body.vector_to_local_frame(v);
        let axes = [
            (local(body_a, Vec3::X), local(body_b, Vec3::Y)),
            (local(body_a, Vec3::Y), local(body_b, Vec3::Z)),
            (local(body_a, Vec3::Z), local(body_b, Vec3::X)),
        ];

        let mut equations = pivot_equations(handle_a, handle_b, max_force).to_vec();
        for _ in 0..3 {
            equations.push(Equation::new(
                EquationKind::Rotational {
                    axis_a: Vec3::X,
                    axis_b: Vec3::Y,
                    max_angle_cos: 0.0,
                },
                handle_a,
                handle_b,
                -max_force,
                max_force,
            ));
        }

        Self {
            body_a: handle_a,
            body_b: handle_b,
            pivot_a,
            pivot_b,
            axes,
            collide_connected: true,
            equations,
        }
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }
}

impl Constraint for LockConstraint {
    constraint_accessors!();

    fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        let (pivots, rotational) = self.equations.split_at_mut(3);
        update_pivot_equations(pivots, body_a, self.pivot_a, body_b, self.pivot_b);

        for (eq, (local_a, local_b)) in rotational.iter_mut().zip(self.axes) {
            if let EquationKind::Rotational { axis_a, axis_b, .. } = &mut eq.kind {
                *axis_a = body_a.vector_to_world_frame(local_a);
                *axis_b = body_b.vector_to_world_frame(local_b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::handles;
    use crate::math::Quat;

    #[test]
    fn test_initial_pose_satisfies_every_equation() {
        let (a, b) = handles();
        let body_a = RigidBody::new(1.0).with_rotation(Quat::from_axis_angle(Vec3::Y, 0.4));
        let body_b = RigidBody::new(1.0)
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_rotation(Quat::from_axis_angle(Vec3::X, -1.1));
        let mut lock = LockConstraint::new(a, &body_a, b, &body_b);
        lock.update(&body_a, &body_b);

        assert_eq!(lock.equations().len(), 6);
        for eq in lock.equations() {
            match eq.kind {
                EquationKind::Contact { normal, ri, rj, .. } => {
                    let gq = (body_b.position + rj - body_a.position - ri).dot(normal);
                    assert!(gq.abs() < 1e-12);
                }
                EquationKind::Rotational { axis_a, axis_b, .. } => {
                    assert!(axis_a.dot(axis_b).abs() < 1e-12);
                }
                _ => panic!("unexpected equation kind"),
            }
        }
    }
}
