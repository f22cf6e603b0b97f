use serde::{Deserialize, Serialize};

use crate::constraints::Equation;
use crate::math::{Mat3, Vec3};

/// Configuration for the constraint solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Maximum number of Gauss-Seidel passes
    pub iterations: usize,
    /// Stop early once the summed impulse change of a pass falls below this
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            tolerance: 1e-7,
        }
    }
}

/// Per-step body state seen by the solver.
///
/// Inverse mass and inertia are the "solve" values: zero for static,
/// kinematic and sleeping bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub force: Vec3,
    pub torque: Vec3,
    pub inv_mass: f64,
    pub inv_inertia_world: Mat3,
    pub linear_factor: Vec3,
    pub angular_factor: Vec3,
    pub vlambda: Vec3,
    pub wlambda: Vec3,
}

/// An immovable body at the origin.
impl Default for SolverBody {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            inv_mass: 0.0,
            inv_inertia_world: Mat3::ZERO,
            linear_factor: Vec3::ZERO,
            angular_factor: Vec3::ZERO,
            vlambda: Vec3::ZERO,
            wlambda: Vec3::ZERO,
        }
    }
}

/// Projected Gauss-Seidel solver over scalar equations
#[derive(Debug, Clone, Default)]
pub struct GsSolver {
    config: SolverConfig,
    b: Vec<f64>,
    inv_c: Vec<f64>,
    lambda: Vec<f64>,
}

impl GsSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            b: Vec::new(),
            inv_c: Vec::new(),
            lambda: Vec::new(),
        }
    }

    pub fn config(&self) -> SolverConfig {
        self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Solves `equations` for step size `h` and adds the resulting velocity
    /// corrections to `bodies`.
    ///
    /// Equation body indices must point into `bodies`. Returns the number of
    /// passes performed.
    pub fn solve(&mut self, h: f64, equations: &mut [Equation], bodies: &mut [SolverBody]) -> usize {
        let n = equations.len();
        if n == 0 {
            return 0;
        }

        self.b.clear();
        self.inv_c.clear();
        self.lambda.clear();
        self.lambda.resize(n, 0.0);
        for eq in equations.iter_mut() {
            self.b.push(eq.compute_b(h, bodies));
        }
        for eq in equations.iter() {
            self.inv_c.push(eq.compute_inv_c(bodies));
        }

        for body in bodies.iter_mut() {
            body.vlambda = Vec3::ZERO;
            body.wlambda = Vec3::ZERO;
        }

        let tolerance_squared = self.config.tolerance * self.config.tolerance;
        let mut iterations = 0;
        for _ in 0..self.config.iterations {
            iterations += 1;
            let mut delta_lambda_total = 0.0;

            for (j, eq) in equations.iter().enumerate() {
                let lambda_j = self.lambda[j];
                let gw_lambda = eq.compute_gw_lambda(bodies);
                let mut delta_lambda =
                    self.inv_c[j] * (self.b[j] - gw_lambda - eq.spook_eps() * lambda_j);

                // Clamp the running total, not the delta
                let min = eq.min_force * h;
                let max = eq.max_force * h;
                if lambda_j + delta_lambda < min {
                    delta_lambda = min - lambda_j;
                } else if lambda_j + delta_lambda > max {
                    delta_lambda = max - lambda_j;
                }

                self.lambda[j] += delta_lambda;
                delta_lambda_total += delta_lambda.abs();
                eq.add_to_wlambda(delta_lambda, bodies);
            }

            if delta_lambda_total * delta_lambda_total < tolerance_squared {
                break;
            }
        }

        for body in bodies.iter_mut() {
            body.velocity += body.vlambda.component_mul(body.linear_factor);
            body.angular_velocity += body.wlambda.component_mul(body.angular_factor);
        }

        for (eq, lambda) in equations.iter_mut().zip(&self.lambda) {
            eq.set_multiplier(lambda / h);
        }

        log::trace!("solved {n} equations in {iterations} iterations");
        iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::EquationKind;
    use crate::dynamics::BodyHandle;
    use slotmap::SlotMap;

    fn handles() -> (BodyHandle, BodyHandle) {
        let mut map: SlotMap<BodyHandle, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    fn dynamic(position: Vec3, velocity: Vec3) -> SolverBody {
        SolverBody {
            position,
            velocity,
            inv_mass: 1.0,
            inv_inertia_world: Mat3::IDENTITY,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            ..SolverBody::default()
        }
    }

    fn fixed(position: Vec3) -> SolverBody {
        SolverBody {
            position,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            ..SolverBody::default()
        }
    }

    #[test]
    fn test_no_equations_is_a_no_op() {
        let mut solver = GsSolver::default();
        let mut bodies = vec![dynamic(Vec3::ZERO, Vec3::X)];
        assert_eq!(solver.solve(0.1, &mut [], &mut bodies), 0);
        assert_eq!(bodies[0].velocity, Vec3::X);
    }

    #[test]
    fn test_contact_stops_approach() {
        let (ground, ball) = handles();
        let mut bodies = vec![
            fixed(Vec3::ZERO),
            dynamic(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -2.0, 0.0)),
        ];
        let mut eq = Equation::contact(ground, ball, Vec3::Y, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, 0.0, 1e6);
        eq.index_a = 0;
        eq.index_b = 1;
        let h = 1.0 / 60.0;
        eq.set_spook_params(1e7, 3.0, h);

        let mut solver = GsSolver::new(SolverConfig {
            iterations: 20,
            tolerance: 0.0,
        });
        let mut equations = vec![eq];
        solver.solve(h, &mut equations, &mut bodies);

        // One step removes 4d/(1+4d) of the approach speed
        assert!((bodies[1].velocity.y + 2.0 / 13.0).abs() < 1e-3);
        assert!(equations[0].multiplier() > 0.0);
        assert_eq!(bodies[0].velocity, Vec3::ZERO);
    }

    #[test]
    fn test_contact_never_pulls() {
        let (ground, ball) = handles();
        let mut bodies = vec![
            fixed(Vec3::ZERO),
            dynamic(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 3.0, 0.0)),
        ];
        let mut eq = Equation::contact(ground, ball, Vec3::Y, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, 0.0, 1e6);
        eq.index_a = 0;
        eq.index_b = 1;
        let mut equations = vec![eq];
        GsSolver::default().solve(1.0 / 60.0, &mut equations, &mut bodies);

        assert_eq!(bodies[1].velocity, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(equations[0].multiplier(), 0.0);
    }

    #[test]
    fn test_friction_is_bounded() {
        let (ground, block) = handles();
        let h = 0.1;
        let mut bodies = vec![
            fixed(Vec3::ZERO),
            dynamic(Vec3::new(0.0, 1.0, 0.0), Vec3::new(5.0, 0.0, 0.0)),
        ];
        let mut eq = Equation::friction(ground, block, Vec3::X, Vec3::ZERO, Vec3::ZERO, 2.0);
        eq.index_a = 0;
        eq.index_b = 1;
        let mut equations = vec![eq];
        GsSolver::default().solve(h, &mut equations, &mut bodies);

        // At most 2 N over 0.1 s removes 0.2 m/s from a unit mass
        assert!((bodies[1].velocity.x - 4.8).abs() < 1e-9);
        assert!((equations[0].multiplier() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_factor_masks_correction() {
        let (ground, ball) = handles();
        let mut body = dynamic(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -2.0, 0.0));
        body.linear_factor = Vec3::new(1.0, 0.0, 1.0);
        let mut bodies = vec![fixed(Vec3::ZERO), body];
        let mut eq = Equation::contact(ground, ball, Vec3::Y, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, 0.0, 1e6);
        eq.index_a = 0;
        eq.index_b = 1;
        GsSolver::default().solve(1.0 / 60.0, &mut [eq], &mut bodies);
        assert_eq!(bodies[1].velocity.y, -2.0);
    }

    #[test]
    fn test_motor_drives_relative_spin() {
        let (a, b) = handles();
        let mut bodies = vec![fixed(Vec3::ZERO), dynamic(Vec3::ZERO, Vec3::ZERO)];
        let mut eq = Equation::new(
            EquationKind::RotationalMotor {
                axis_a: Vec3::Z,
                axis_b: Vec3::Z,
                target_velocity: 1.0,
            },
            a,
            b,
            -1e6,
            1e6,
        );
        eq.index_a = 0;
        eq.index_b = 1;
        let mut solver = GsSolver::new(SolverConfig {
            iterations: 50,
            tolerance: 0.0,
        });
        solver.solve(1.0 / 60.0, &mut [eq], &mut bodies);

        // GW = wa.z - wb.z is driven most of the way to the target in one step
        let spin = -bodies[1].angular_velocity.z;
        assert!(spin > 0.85 && spin <= 1.0);
        // The fixed side took no share of the impulse
        assert_eq!(bodies[0].angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_default_body_is_immovable() {
        let body = SolverBody::default();
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia_world, Mat3::ZERO);
        assert_eq!(body.inv_inertia_world * Vec3::ONE, Vec3::ZERO);
    }
}
