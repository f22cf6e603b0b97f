use crate::dynamics::BodyHandle;
use crate::math::Vec3;
use crate::solver::SolverBody;

/// Per-body row of the constraint Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JacobianElement {
    pub spatial: Vec3,
    pub rotational: Vec3,
}

impl JacobianElement {
    #[inline]
    pub fn multiply_vectors(&self, spatial: Vec3, rotational: Vec3) -> f64 {
        self.spatial.dot(spatial) + self.rotational.dot(rotational)
    }
}

/// What an equation constrains, with the world-space data its Jacobian is built from.
///
/// Offsets `ri`/`rj` are world-space vectors from each body's centre to its
/// anchor point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquationKind {
    /// Non-penetration along `normal` (pointing from body A to body B)
    Contact {
        normal: Vec3,
        ri: Vec3,
        rj: Vec3,
        restitution: f64,
    },
    /// Zero relative velocity along `tangent`
    Friction { tangent: Vec3, ri: Vec3, rj: Vec3 },
    /// Keeps the angle between `axis_a` and `axis_b` at or below `acos(max_angle_cos)`
    ///
    /// With `max_angle_cos = 0` the axes are held perpendicular.
    Rotational {
        axis_a: Vec3,
        axis_b: Vec3,
        max_angle_cos: f64,
    },
    /// Drives the relative angular speed about the axes towards `target_velocity`
    RotationalMotor {
        axis_a: Vec3,
        axis_b: Vec3,
        target_velocity: f64,
    },
}

/// A single scalar velocity constraint between two bodies.
///
/// `min_force`/`max_force` bound the force the solver may apply; the running
/// impulse is clamped to those bounds times the step size. After solving,
/// [`Equation::multiplier`] holds the force that was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Shape indices within the two bodies, for contact bookkeeping
    pub shapes: Option<(usize, usize)>,
    pub kind: EquationKind,
    pub min_force: f64,
    pub max_force: f64,
    pub enabled: bool,

    jacobian_a: JacobianElement,
    jacobian_b: JacobianElement,

    stiffness: f64,
    relaxation: f64,
    spook_a: f64,
    spook_b: f64,
    spook_eps: f64,

    multiplier: f64,

    pub(crate) index_a: usize,
    pub(crate) index_b: usize,
}

impl Equation {
    pub const DEFAULT_STIFFNESS: f64 = 1e7;
    pub const DEFAULT_RELAXATION: f64 = 4.0;

    pub fn new(
        kind: EquationKind,
        body_a: BodyHandle,
        body_b: BodyHandle,
        min_force: f64,
        max_force: f64,
    ) -> Self {
        let mut equation = Self {
            body_a,
            body_b,
            shapes: None,
            kind,
            min_force,
            max_force,
            enabled: true,
            jacobian_a: JacobianElement::default(),
            jacobian_b: JacobianElement::default(),
            stiffness: Self::DEFAULT_STIFFNESS,
            relaxation: Self::DEFAULT_RELAXATION,
            spook_a: 0.0,
            spook_b: 0.0,
            spook_eps: 0.0,
            multiplier: 0.0,
            index_a: 0,
            index_b: 0,
        };
        equation.set_spook_params(Self::DEFAULT_STIFFNESS, Self::DEFAULT_RELAXATION, 1.0 / 60.0);
        equation
    }

    /// Contact equation with force range `[0, max_force]`.
    pub fn contact(
        body_a: BodyHandle,
        body_b: BodyHandle,
        normal: Vec3,
        ri: Vec3,
        rj: Vec3,
        restitution: f64,
        max_force: f64,
    ) -> Self {
        Self::new(
            EquationKind::Contact {
                normal,
                ri,
                rj,
                restitution,
            },
            body_a,
            body_b,
            0.0,
            max_force,
        )
    }

    /// Friction equation with the symmetric force range `[-slip_force, slip_force]`.
    pub fn friction(
        body_a: BodyHandle,
        body_b: BodyHandle,
        tangent: Vec3,
        ri: Vec3,
        rj: Vec3,
        slip_force: f64,
    ) -> Self {
        Self::new(
            EquationKind::Friction { tangent, ri, rj },
            body_a,
            body_b,
            -slip_force,
            slip_force,
        )
    }

    /// Recomputes the SPOOK constants from stiffness `k`, relaxation `d`
    /// (in steps) and time step `h`.
    pub fn set_spook_params(&mut self, stiffness: f64, relaxation: f64, h: f64) {
        let k = stiffness;
        let d = relaxation;
        self.stiffness = k;
        self.relaxation = d;
        self.spook_a = 4.0 / (h * (1.0 + 4.0 * d));
        self.spook_b = (4.0 * d) / (1.0 + 4.0 * d);
        self.spook_eps = 4.0 / (h * h * k * (1.0 + 4.0 * d));
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn relaxation(&self) -> f64 {
        self.relaxation
    }

    #[inline]
    pub fn spook_eps(&self) -> f64 {
        self.spook_eps
    }

    /// Force applied by the last solve, `lambda / h`.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub(crate) fn set_multiplier(&mut self, multiplier: f64) {
        self.multiplier = multiplier;
    }

    pub fn jacobian_a(&self) -> JacobianElement {
        self.jacobian_a
    }

    pub fn jacobian_b(&self) -> JacobianElement {
        self.jacobian_b
    }

    /// Contact normal, for contact equations.
    pub fn contact_normal(&self) -> Option<Vec3> {
        match self.kind {
            EquationKind::Contact { normal, .. } => Some(normal),
            _ => None,
        }
    }

    fn update_jacobians(&mut self) {
        let (a, b) = match self.kind {
            EquationKind::Contact { normal, ri, rj, .. } => (
                JacobianElement {
                    spatial: -normal,
                    rotational: -ri.cross(normal),
                },
                JacobianElement {
                    spatial: normal,
                    rotational: rj.cross(normal),
                },
            ),
            EquationKind::Friction { tangent, ri, rj } => (
                JacobianElement {
                    spatial: -tangent,
                    rotational: -ri.cross(tangent),
                },
                JacobianElement {
                    spatial: tangent,
                    rotational: rj.cross(tangent),
                },
            ),
            EquationKind::Rotational { axis_a, axis_b, .. } => (
                JacobianElement {
                    spatial: Vec3::ZERO,
                    rotational: axis_b.cross(axis_a),
                },
                JacobianElement {
                    spatial: Vec3::ZERO,
                    rotational: axis_a.cross(axis_b),
                },
            ),
            EquationKind::RotationalMotor { axis_a, axis_b, .. } => (
                JacobianElement {
                    spatial: Vec3::ZERO,
                    rotational: axis_a,
                },
                JacobianElement {
                    spatial: Vec3::ZERO,
                    rotational: -axis_b,
                },
            ),
        };
        self.jacobian_a = a;
        self.jacobian_b = b;
    }

    /// Right-hand side `B = -a*Gq - b*GW - h*GiMf` for step size `h`.
    ///
    /// Also refreshes the Jacobian rows from the current [`EquationKind`].
    pub fn compute_b(&mut self, h: f64, bodies: &[SolverBody]) -> f64 {
        self.update_jacobians();

        let bi = &bodies[self.index_a];
        let bj = &bodies[self.index_b];
        let gi_mf = self.compute_gi_mf(bodies);

        match self.kind {
            EquationKind::Contact {
                normal,
                ri,
                rj,
                restitution,
            } => {
                let e_plus_one = restitution + 1.0;
                let penetration = (bj.position + rj - bi.position - ri).dot(normal);
                let gw = e_plus_one * bj.velocity.dot(normal) - e_plus_one * bi.velocity.dot(normal)
                    + bj.angular_velocity.dot(self.jacobian_b.rotational)
                    + bi.angular_velocity.dot(self.jacobian_a.rotational);
                -penetration * self.spook_a - gw * self.spook_b - h * gi_mf
            }
            EquationKind::Friction { .. } => {
                let gw = self.compute_gw(bodies);
                -gw * self.spook_b - h * gi_mf
            }
            EquationKind::Rotational {
                axis_a,
                axis_b,
                max_angle_cos,
            } => {
                let gq = max_angle_cos - axis_a.dot(axis_b);
                let gw = self.compute_gw(bodies);
                -gq * self.spook_a - gw * self.spook_b - h * gi_mf
            }
            EquationKind::RotationalMotor {
                target_velocity, ..
            } => {
                let gw = self.compute_gw(bodies) - target_velocity;
                -gw * self.spook_b - h * gi_mf
            }
        }
    }

    /// Constraint-space relative velocity `G * W`.
    pub fn compute_gw(&self, bodies: &[SolverBody]) -> f64 {
        let bi = &bodies[self.index_a];
        let bj = &bodies[self.index_b];
        self.jacobian_a.multiply_vectors(bi.velocity, bi.angular_velocity)
            + self.jacobian_b.multiply_vectors(bj.velocity, bj.angular_velocity)
    }

    /// Relative velocity of the corrections accumulated so far in this solve.
    pub fn compute_gw_lambda(&self, bodies: &[SolverBody]) -> f64 {
        let bi = &bodies[self.index_a];
        let bj = &bodies[self.index_b];
        self.jacobian_a.multiply_vectors(bi.vlambda, bi.wlambda)
            + self.jacobian_b.multiply_vectors(bj.vlambda, bj.wlambda)
    }

    /// `G * M^-1 * f` for the external forces acting on both bodies.
    pub fn compute_gi_mf(&self, bodies: &[SolverBody]) -> f64 {
        let bi = &bodies[self.index_a];
        let bj = &bodies[self.index_b];
        self.jacobian_a.multiply_vectors(
            bi.force * bi.inv_mass,
            bi.inv_inertia_world * bi.torque,
        ) + self.jacobian_b.multiply_vectors(
            bj.force * bj.inv_mass,
            bj.inv_inertia_world * bj.torque,
        )
    }

    /// Effective inverse mass along the constraint, `G * M^-1 * G^T`.
    pub fn compute_gi_mgt(&self, bodies: &[SolverBody]) -> f64 {
        let bi = &bodies[self.index_a];
        let bj = &bodies[self.index_b];
        let ga = &self.jacobian_a;
        let gb = &self.jacobian_b;
        bi.inv_mass * ga.spatial.length_squared()
            + ga.rotational.dot(bi.inv_inertia_world * ga.rotational)
            + bj.inv_mass * gb.spatial.length_squared()
            + gb.rotational.dot(bj.inv_inertia_world * gb.rotational)
    }

    /// `1 / (G * M^-1 * G^T + eps)`.
    pub fn compute_inv_c(&self, bodies: &[SolverBody]) -> f64 {
        1.0 / (self.compute_gi_mgt(bodies) + self.spook_eps)
    }

    /// Scatters an impulse delta into both bodies' correction accumulators.
    pub fn add_to_wlambda(&self, delta_lambda: f64, bodies: &mut [SolverBody]) {
        let ga = self.jacobian_a;
        let gb = self.jacobian_b;

        let bi = &mut bodies[self.index_a];
        bi.vlambda += ga.spatial * (bi.inv_mass * delta_lambda);
        bi.wlambda += bi.inv_inertia_world * ga.rotational * delta_lambda;

        let bj = &mut bodies[self.index_b];
        bj.vlambda += gb.spatial * (bj.inv_mass * delta_lambda);
        bj.wlambda += bj.inv_inertia_world * gb.rotational * delta_lambda;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat3;
    use slotmap::SlotMap;

    fn handles() -> (BodyHandle, BodyHandle) {
        let mut map: SlotMap<BodyHandle, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    fn unit_body(position: Vec3) -> SolverBody {
        SolverBody {
            position,
            inv_mass: 1.0,
            inv_inertia_world: Mat3::IDENTITY,
            ..SolverBody::default()
        }
    }

    #[test]
    fn test_spook_params() {
        let (a, b) = handles();
        let mut eq = Equation::contact(a, b, Vec3::Y, Vec3::ZERO, Vec3::ZERO, 0.0, 1e6);
        eq.set_spook_params(1e7, 3.0, 0.1);
        assert!((eq.spook_a - 4.0 / (0.1 * 13.0)).abs() < 1e-12);
        assert!((eq.spook_b - 12.0 / 13.0).abs() < 1e-12);
        assert!((eq.spook_eps - 4.0 / (0.01 * 1e7 * 13.0)).abs() < 1e-18);
    }

    #[test]
    fn test_contact_jacobian_and_penetration() {
        let (a, b) = handles();
        let bodies = vec![unit_body(Vec3::ZERO), unit_body(Vec3::new(0.0, 0.9, 0.0))];
        // Unit spheres overlapping by 0.1 along +Y
        let mut eq = Equation::contact(
            a,
            b,
            Vec3::Y,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, -0.5, 0.0),
            0.0,
            1e6,
        );
        eq.index_a = 0;
        eq.index_b = 1;
        let rhs = eq.compute_b(1.0 / 60.0, &bodies);
        assert_eq!(eq.jacobian_a().spatial, -Vec3::Y);
        assert_eq!(eq.jacobian_b().spatial, Vec3::Y);
        // Penetration is negative, so the bias pushes apart
        assert!(rhs > 0.0);

        let gimgt = eq.compute_gi_mgt(&bodies);
        assert!((gimgt - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_to_wlambda_is_equal_and_opposite() {
        let (a, b) = handles();
        let mut bodies = vec![unit_body(Vec3::ZERO), unit_body(Vec3::X)];
        let mut eq = Equation::friction(a, b, Vec3::Z, Vec3::ZERO, Vec3::ZERO, 1.0);
        eq.index_a = 0;
        eq.index_b = 1;
        eq.compute_b(0.01, &bodies);
        eq.add_to_wlambda(2.0, &mut bodies);
        assert_eq!(bodies[0].vlambda, Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(bodies[1].vlambda, Vec3::new(0.0, 0.0, 2.0));
        assert!((eq.compute_gw_lambda(&bodies) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotational_violation_sign() {
        let (a, b) = handles();
        let bodies = vec![unit_body(Vec3::ZERO), unit_body(Vec3::ZERO)];
        let mut eq = Equation::new(
            EquationKind::Rotational {
                axis_a: Vec3::X,
                axis_b: Vec3::new(1.0, 1.0, 0.0).normalize(),
                max_angle_cos: 0.0,
            },
            a,
            b,
            -1e6,
            1e6,
        );
        eq.index_a = 0;
        eq.index_b = 1;
        let rhs = eq.compute_b(1.0 / 60.0, &bodies);
        // Gq = -cos(45deg) < 0, the bias is positive
        assert!(rhs > 0.0);
        assert!(eq.jacobian_a().rotational.almost_equals(-eq.jacobian_b().rotational, 1e-12));
    }
}
