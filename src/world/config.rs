use serde::{Deserialize, Serialize};

use crate::collision::BroadphaseKind;
use crate::error::{PhysicsError, Result};
use crate::material::ContactParams;
use crate::math::Vec3;
use crate::solver::SolverConfig;

/// Configuration for the physics world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Gravity vector
    pub gravity: Vec3,
    /// Gravity used for the friction bound, `gravity` when unset
    pub friction_gravity: Option<Vec3>,
    pub broadphase: BroadphaseKind,
    /// Solver configuration
    pub solver: SolverConfig,
    /// Run the body sleep state machines
    pub allow_sleep: bool,
    /// Renormalize orientations only every `quat_normalize_skip + 1` steps
    pub quat_normalize_skip: u32,
    pub quat_normalize_fast: bool,
    /// One averaged friction pair per shape pair instead of two per contact
    pub friction_reduction: bool,
    /// Maximum substeps per call to [`World::step_with_elapsed`](super::World::step_with_elapsed)
    pub max_sub_steps: usize,
    /// Parameters for material pairs without a contact material
    pub default_contact_material: ContactParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.82, 0.0),
            friction_gravity: None,
            broadphase: BroadphaseKind::Naive,
            solver: SolverConfig::default(),
            allow_sleep: false,
            quat_normalize_skip: 0,
            quat_normalize_fast: false,
            friction_reduction: false,
            max_sub_steps: 10,
            default_contact_material: ContactParams::default(),
        }
    }
}

impl WorldConfig {
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_broadphase(mut self, broadphase: BroadphaseKind) -> Self {
        self.broadphase = broadphase;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_friction_reduction(mut self, friction_reduction: bool) -> Self {
        self.friction_reduction = friction_reduction;
        self
    }

    pub fn with_default_contact_material(mut self, params: ContactParams) -> Self {
        self.default_contact_material = params;
        self
    }

    /// Magnitude of the gravity used for friction bounds.
    pub fn friction_gravity_magnitude(&self) -> f64 {
        self.friction_gravity.unwrap_or(self.gravity).length()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig(format!("gravity {:?} is not finite", self.gravity)));
        }
        if let Some(g) = self.friction_gravity {
            if !g.is_finite() {
                return Err(PhysicsError::InvalidConfig(format!("friction gravity {g:?} is not finite")));
            }
        }
        if self.solver.iterations == 0 {
            return Err(PhysicsError::InvalidConfig("solver needs at least one iteration".into()));
        }
        if self.solver.tolerance.is_nan() || self.solver.tolerance < 0.0 {
            return Err(PhysicsError::InvalidConfig(format!(
                "solver tolerance {} must be non-negative",
                self.solver.tolerance
            )));
        }

        let params = &self.default_contact_material;
        for (name, stiffness) in [
            ("contact", params.contact_equation_stiffness),
            ("friction", params.friction_equation_stiffness),
        ] {
            if stiffness.is_nan() || stiffness < 0.0 {
                return Err(PhysicsError::InvalidConfig(format!("{name} stiffness {stiffness} is negative")));
            }
        }
        for (name, relaxation) in [
            ("contact", params.contact_equation_relaxation),
            ("friction", params.friction_equation_relaxation),
        ] {
            if relaxation.is_nan() || relaxation <= 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} relaxation {relaxation} must be positive"
                )));
            }
        }
        Ok(())
    }
}
