use crate::dynamics::{BodyHandle, RigidBody};
use crate::math::Vec3;

use super::point_to_point::{pivot_equations, update_pivot_equations};
use super::{Constraint, Equation, EquationKind, DEFAULT_MAX_FORCE};

const MOTOR: usize = 5;

/// Lets two bodies rotate relative to each other about one shared axis.
///
/// Pivots and axes are in each body's local frame. The built-in motor is off
/// until [`HingeConstraint::enable_motor`] is called.
#[derive(Debug, Clone)]
pub struct HingeConstraint {
    body_a: BodyHandle,
    body_b: BodyHandle,
    pivot_a: Vec3,
    axis_a: Vec3,
    pivot_b: Vec3,
    axis_b: Vec3,
    pub collide_connected: bool,
    equations: Vec<Equation>,
}

impl HingeConstraint {
    pub fn new(
        body_a: BodyHandle,
        pivot_a: Vec3,
        axis_a: Vec3,
        body_b: BodyHandle,
        pivot_b: Vec3,
        axis_b: Vec3,
    ) -> Self {
        Self::with_max_force(body_a, pivot_a, axis_a, body_b, pivot_b, axis_b, DEFAULT_MAX_FORCE)
    }

    pub fn with_max_force(
        body_a: BodyHandle,
        pivot_a: Vec3,
        axis_a: Vec3,
        body_b: BodyHandle,
        pivot_b: Vec3,
        axis_b: Vec3,
        max_force: f64,
    ) -> Self {
        let axis_a = axis_a.normalize();
        let axis_b = axis_b.normalize();

        let mut equations = pivot_equations(body_a, body_b, max_force).to_vec();
        for _ in 0..2 {
            equations.push(Equation::new(
                EquationKind::Rotational {
                    axis_a,
                    axis_b,
                    max_angle_cos: 0.0,
                },
                body_a,
                body_b,
                -max_force,
                max_force,
            ));
        }
        let mut motor = Equation::new(
            EquationKind::RotationalMotor {
                axis_a,
                axis_b,
                target_velocity: 0.0,
            },
            body_a,
            body_b,
            -max_force,
            max_force,
        );
        motor.enabled = false;
        equations.push(motor);

        Self {
            body_a,
            body_b,
            pivot_a,
            axis_a,
            pivot_b,
            axis_b,
            collide_connected: true,
            equations,
        }
    }

    pub fn with_collide_connected(mut self, collide_connected: bool) -> Self {
        self.collide_connected = collide_connected;
        self
    }

    pub fn enable_motor(&mut self) {
        self.equations[MOTOR].enabled = true;
    }

    pub fn disable_motor(&mut self) {
        self.equations[MOTOR].enabled = false;
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.equations[MOTOR].enabled
    }

    /// Target relative angular speed about the hinge axis, in rad/s.
    pub fn set_motor_speed(&mut self, speed: f64) {
        if let EquationKind::RotationalMotor { target_velocity, .. } = &mut self.equations[MOTOR].kind {
            *target_velocity = speed;
        }
    }

    pub fn set_motor_max_force(&mut self, max_force: f64) {
        let motor = &mut self.equations[MOTOR];
        motor.min_force = -max_force;
        motor.max_force = max_force;
    }

    pub fn motor_equation(&self) -> &Equation {
        &self.equations[MOTOR]
    }
}

impl Constraint for HingeConstraint {
    constraint_accessors!();

    fn update(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        let (pivots, rest) = self.equations.split_at_mut(3);
        update_pivot_equations(pivots, body_a, self.pivot_a, body_b, self.pivot_b);

        let world_axis_a = body_a.vector_to_world_frame(self.axis_a);
        let world_axis_b = body_b.vector_to_world_frame(self.axis_b);
        let (t1, t2) = world_axis_a.tangents();

        for (eq, tangent) in rest.iter_mut().zip([t1, t2]) {
            if let EquationKind::Rotational { axis_a, axis_b, .. } = &mut eq.kind {
                *axis_a = tangent;
                *axis_b = world_axis_b;
            }
        }

        if let Some(EquationKind::RotationalMotor { axis_a, axis_b, .. }) =
            rest.get_mut(MOTOR - 3).map(|eq| &mut eq.kind)
        {
            *axis_a = world_axis_a;
            *axis_b = world_axis_b;
        }
    }
}
