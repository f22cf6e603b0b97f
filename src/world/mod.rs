//! The simulation container and its step loop.

mod config;
mod events;

use slotmap::{SecondaryMap, SlotMap};

use crate::collision::broad_phase::BodySet;
use crate::collision::matrix::{body_pair, BodyPair, CollisionMatrix, OverlapKeeper, ShapePair};
use crate::collision::{Broadphase, Narrowphase, PairMaterial};
use crate::constraints::{Constraint, ConstraintHandle, Equation, EquationKind, Spring, SpringHandle};
use crate::dynamics::{apply_damping, integrate_body, BodyHandle, QuatNormalization, RigidBody, SleepState};
use crate::error::{PhysicsError, Result};
use crate::geometry::Aabb;
use crate::material::{ContactMaterial, ContactMaterialTable, Material, MaterialHandle};
use crate::math::Vec3;
use crate::raycast::{Ray, RayMode, RayOptions, RaycastResult};
use crate::solver::{GsSolver, SolverBody};

pub use config::WorldConfig;
pub use events::WorldEvent;

/// The physics world: bodies, constraints, materials and the machinery that
/// advances them.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    bodies: BodySet,
    constraints: SlotMap<ConstraintHandle, Box<dyn Constraint>>,
    springs: SlotMap<SpringHandle, Spring>,
    materials: Vec<Material>,
    contact_materials: ContactMaterialTable,

    broadphase: Box<dyn Broadphase>,
    narrowphase: Narrowphase,
    solver: GsSolver,

    collision_matrix: CollisionMatrix,
    body_overlaps: OverlapKeeper<BodyPair>,
    shape_overlaps: OverlapKeeper<ShapePair>,

    // Per-step buffers, cleared rather than freed
    pairs: Vec<(BodyHandle, BodyHandle)>,
    equations: Vec<Equation>,
    solver_bodies: Vec<SolverBody>,
    solver_handles: Vec<BodyHandle>,
    solver_index: SecondaryMap<BodyHandle, usize>,
    query: Vec<BodyHandle>,

    events: Vec<WorldEvent>,
    time: f64,
    step_number: u64,
    accumulator: f64,
    has_active_bodies: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::with_valid_config(WorldConfig::default())
    }
}

impl World {
    /// Creates a world after checking `config`.
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: WorldConfig) -> Self {
        Self {
            broadphase: config.broadphase.build(),
            solver: GsSolver::new(config.solver),
            config,
            bodies: SlotMap::with_key(),
            constraints: SlotMap::with_key(),
            springs: SlotMap::with_key(),
            materials: Vec::new(),
            contact_materials: ContactMaterialTable::default(),
            narrowphase: Narrowphase::new(),
            collision_matrix: CollisionMatrix::new(),
            body_overlaps: OverlapKeeper::new(),
            shape_overlaps: OverlapKeeper::new(),
            pairs: Vec::new(),
            equations: Vec::new(),
            solver_bodies: Vec::new(),
            solver_handles: Vec::new(),
            solver_index: SecondaryMap::new(),
            query: Vec::new(),
            events: Vec::new(),
            time: 0.0,
            step_number: 0,
            accumulator: 0.0,
            has_active_bodies: true,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_number(&self) -> u64 {
        self.step_number
    }

    /// False once every non-static body is asleep.
    pub fn has_active_bodies(&self) -> bool {
        self.has_active_bodies
    }

    // Bodies

    pub fn add_body(&mut self, mut body: RigidBody) -> BodyHandle {
        body.previous_position = body.position;
        body.previous_rotation = body.rotation;
        body.interpolated_position = body.position;
        body.interpolated_rotation = body.rotation;
        body.invalidate_aabb();

        let handle = self.bodies.insert(body);
        self.broadphase.add_body(handle);
        log::debug!("added body {handle:?}");
        handle
    }

    /// Removes a body together with the constraints and springs attached to it.
    ///
    /// Every contact the body was part of ends with an `EndContact` event.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        self.broadphase.remove_body(handle);
        self.collision_matrix.remove_body(handle);

        for (body_a, body_b) in self.body_overlaps.remove_where(|&(a, b)| a == handle || b == handle) {
            self.events.push(WorldEvent::EndContact { body_a, body_b });
        }
        for ((body_a, shape_a), (body_b, shape_b)) in self
            .shape_overlaps
            .remove_where(|&((a, _), (b, _))| a == handle || b == handle)
        {
            self.events.push(WorldEvent::EndShapeContact {
                body_a,
                shape_a,
                body_b,
                shape_b,
            });
        }

        let constraints = self.constraints.len();
        self.constraints
            .retain(|_, c| c.body_a() != handle && c.body_b() != handle);
        let springs = self.springs.len();
        self.springs
            .retain(|_, s| s.body_a != handle && s.body_b != handle);
        log::debug!(
            "removed body {handle:?} with {} constraints and {} springs",
            constraints - self.constraints.len(),
            springs - self.springs.len()
        );
        Some(body)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutable access to a body. Its AABB is recomputed before the next query.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        let body = self.bodies.get_mut(handle)?;
        body.invalidate_aabb();
        Some(body)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // Constraints and springs

    pub fn add_constraint<C: Constraint>(&mut self, constraint: C) -> Result<ConstraintHandle> {
        for body in [constraint.body_a(), constraint.body_b()] {
            if !self.bodies.contains_key(body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        let handle = self.constraints.insert(Box::new(constraint));
        log::debug!("added constraint {handle:?}");
        Ok(handle)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<Box<dyn Constraint>> {
        self.constraints
            .remove(handle)
            .ok_or(PhysicsError::UnknownConstraint(handle))
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&dyn Constraint> {
        self.constraints.get(handle).map(|c| c.as_ref())
    }

    /// The constraint behind `handle` as its concrete type.
    pub fn constraint_mut<C: Constraint>(&mut self, handle: ConstraintHandle) -> Option<&mut C> {
        self.constraints
            .get_mut(handle)
            .and_then(|c| c.as_any_mut().downcast_mut::<C>())
    }

    pub fn add_spring(&mut self, spring: Spring) -> Result<SpringHandle> {
        for body in [spring.body_a, spring.body_b] {
            if !self.bodies.contains_key(body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        Ok(self.springs.insert(spring))
    }

    pub fn remove_spring(&mut self, handle: SpringHandle) -> Option<Spring> {
        self.springs.remove(handle)
    }

    pub fn spring_mut(&mut self, handle: SpringHandle) -> Option<&mut Spring> {
        self.springs.get_mut(handle)
    }

    // Materials

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        let handle = MaterialHandle(self.materials.len() as u32);
        self.materials.push(material);
        handle
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0 as usize)
    }

    /// Registers parameters for a material pair, replacing any previous entry.
    pub fn add_contact_material(&mut self, contact_material: ContactMaterial) -> Option<ContactMaterial> {
        self.contact_materials.insert(contact_material)
    }

    pub fn contact_materials(&self) -> &ContactMaterialTable {
        &self.contact_materials
    }

    // Events and queries

    /// Takes the events collected since the last call.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, WorldEvent> {
        self.events.drain(..)
    }

    /// Contact equations of the last step, with their resolved multipliers.
    pub fn contacts(&self) -> &[Equation] {
        &self.narrowphase.contacts
    }

    /// Friction equations of the last step.
    pub fn frictions(&self) -> &[Equation] {
        &self.narrowphase.frictions
    }

    /// Bodies whose AABB overlaps `aabb`.
    pub fn aabb_query(&mut self, aabb: Aabb) -> Vec<BodyHandle> {
        self.refresh_aabbs();
        let mut result = Vec::new();
        self.broadphase.aabb_query(&self.bodies, aabb, &mut result);
        result
    }

    /// Casts `ray` against the bodies the broadphase finds along it.
    ///
    /// With [`RayMode::All`] every hit goes to `callback`; the closest hit
    /// (or the first, for [`RayMode::Any`]) is returned in every mode.
    pub fn ray_test(
        &mut self,
        ray: &Ray,
        options: &RayOptions,
        callback: &mut dyn FnMut(&RaycastResult),
    ) -> Option<RaycastResult> {
        self.refresh_aabbs();
        self.query.clear();
        self.broadphase.aabb_query(&self.bodies, ray.aabb(), &mut self.query);

        let bodies = &self.bodies;
        let candidates = self
            .query
            .iter()
            .filter_map(|&h| bodies.get(h).map(|body| (h, body)));
        ray.intersect_bodies(candidates, options, callback)
    }

    pub fn raycast_closest(&mut self, from: Vec3, to: Vec3, options: &RayOptions) -> Option<RaycastResult> {
        let options = options.with_mode(RayMode::Closest);
        self.ray_test(&Ray::new(from, to), &options, &mut |_| {})
    }

    pub fn raycast_any(&mut self, from: Vec3, to: Vec3, options: &RayOptions) -> Option<RaycastResult> {
        let options = options.with_mode(RayMode::Any);
        self.ray_test(&Ray::new(from, to), &options, &mut |_| {})
    }

    /// Reports every hit along the segment. Returns whether there was any.
    pub fn raycast_all(
        &mut self,
        from: Vec3,
        to: Vec3,
        options: &RayOptions,
        mut callback: impl FnMut(&RaycastResult),
    ) -> bool {
        let options = options.with_mode(RayMode::All);
        self.ray_test(&Ray::new(from, to), &options, &mut callback)
            .is_some()
    }

    // Stepping

    /// Advances the simulation by exactly one step of `dt`.
    pub fn step(&mut self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            log::warn!("ignoring step with non-positive dt {dt}");
            return;
        }
        self.internal_step(dt);
        for body in self.bodies.values_mut() {
            body.interpolated_position = body.position;
            body.interpolated_rotation = body.rotation;
        }
    }

    /// Accumulates `elapsed` wall time and runs as many fixed steps of `dt`
    /// as fit, at most `max_sub_steps` (the configured limit when `None`).
    ///
    /// Interpolated poses are then set between the last two steps by the
    /// leftover fraction of a step. Returns the number of steps taken.
    pub fn step_with_elapsed(&mut self, dt: f64, elapsed: f64, max_sub_steps: Option<usize>) -> usize {
        if !(dt.is_finite() && dt > 0.0) {
            log::warn!("ignoring step with non-positive dt {dt}");
            return 0;
        }
        let max_sub_steps = max_sub_steps.unwrap_or(self.config.max_sub_steps);

        self.accumulator += elapsed.max(0.0);
        let mut sub_steps = 0;
        while self.accumulator >= dt && sub_steps < max_sub_steps {
            self.internal_step(dt);
            self.accumulator -= dt;
            sub_steps += 1;
        }
        if self.accumulator >= dt {
            log::warn!(
                "substep budget of {max_sub_steps} exhausted, dropping {:.4}s",
                self.accumulator - self.accumulator % dt
            );
        }
        self.accumulator %= dt;

        let t = self.accumulator / dt;
        for body in self.bodies.values_mut() {
            body.interpolated_position = body.previous_position.lerp(body.position, t);
            body.interpolated_rotation = body.previous_rotation.slerp(body.rotation, t).normalize();
        }
        sub_steps
    }

    fn refresh_aabbs(&mut self) {
        for body in self.bodies.values_mut() {
            body.aabb();
        }
    }

    fn internal_step(&mut self, dt: f64) {
        self.apply_springs();

        let gravity = self.config.gravity;
        for body in self.bodies.values_mut() {
            if body.is_dynamic() {
                let weight = gravity * body.mass();
                body.force += weight;
            }
        }

        self.refresh_aabbs();
        self.broadphase.collision_pairs(&self.bodies, &mut self.pairs);

        for constraint in self.constraints.values() {
            if !constraint.collide_connected() {
                let key = body_pair(constraint.body_a(), constraint.body_b());
                self.pairs.retain(|&(a, b)| body_pair(a, b) != key);
            }
        }

        self.collision_matrix.tick();

        self.narrowphase.enable_friction_reduction = self.config.friction_reduction;
        let materials = PairMaterial {
            materials: &self.materials,
            contact_materials: &self.contact_materials,
            default_params: self.config.default_contact_material,
            friction_gravity: self.config.friction_gravity_magnitude(),
        };
        self.narrowphase
            .get_contacts(&self.pairs, &self.bodies, &materials, dt);

        self.process_contacts();
        self.update_overlaps();

        let solved = self.solve(dt);

        for body in self.bodies.values_mut() {
            apply_damping(body, dt);
        }

        let normalization = QuatNormalization {
            skip: self.config.quat_normalize_skip,
            fast: self.config.quat_normalize_fast,
        };
        let normalize = normalization
            .applies_to(self.step_number)
            .then_some(normalization);
        for body in self.bodies.values_mut() {
            body.previous_position = body.position;
            body.previous_rotation = body.rotation;
            integrate_body(body, dt, normalize);
            body.clear_forces();
        }

        self.time += dt;
        self.step_number += 1;

        self.update_sleep();

        log::trace!(
            "step {}: {} pairs, {} contacts, {} equations solved",
            self.step_number,
            self.pairs.len(),
            self.narrowphase.contacts.len(),
            solved
        );
    }

    fn apply_springs(&mut self) {
        for spring in self.springs.values() {
            if let Some([a, b]) = self.bodies.get_disjoint_mut([spring.body_a, spring.body_b]) {
                spring.apply_force(a, b);
            }
        }
    }

    /// Collision matrix, `Collide` events and wake-up scheduling for the
    /// contact equations of this step.
    fn process_contacts(&mut self) {
        for eq in &self.narrowphase.contacts {
            let (ha, hb) = (eq.body_a, eq.body_b);
            let (Some(a), Some(b)) = (self.bodies.get(ha), self.bodies.get(hb)) else {
                continue;
            };

            let wake_a = should_wake(a, b);
            let wake_b = should_wake(b, a);

            let first_contact =
                !self.collision_matrix.get(ha, hb) && !self.collision_matrix.get_previous(ha, hb);
            if first_contact {
                if let EquationKind::Contact { normal, ri, rj, .. } = eq.kind {
                    let (xi, xj) = (a.position + ri, b.position + rj);
                    let impact_velocity =
                        normal.dot(a.velocity_at_world_point(xi) - b.velocity_at_world_point(xj));
                    self.events.push(WorldEvent::Collide {
                        body: ha,
                        other: hb,
                        contact_point: xi,
                        normal,
                        impact_velocity,
                    });
                    self.events.push(WorldEvent::Collide {
                        body: hb,
                        other: ha,
                        contact_point: xj,
                        normal: -normal,
                        impact_velocity,
                    });
                }
            }
            self.collision_matrix.set(ha, hb, true);

            if wake_a {
                self.bodies[ha].wake_up_after_narrowphase = true;
            }
            if wake_b {
                self.bodies[hb].wake_up_after_narrowphase = true;
            }
        }

        for (handle, body) in self.bodies.iter_mut() {
            if body.wake_up_after_narrowphase {
                body.wake_up();
                body.woke_up = false;
                self.events.push(WorldEvent::WakeUp { body: handle });
            }
        }
    }

    /// Diffs this step's overlaps against the last into begin and end events.
    fn update_overlaps(&mut self) {
        self.body_overlaps.tick();
        for &pair in &self.narrowphase.body_overlaps {
            self.body_overlaps.set(pair);
        }
        self.shape_overlaps.tick();
        for &pair in &self.narrowphase.shape_overlaps {
            self.shape_overlaps.set(pair);
        }

        let (mut begun, mut ended) = (Vec::new(), Vec::new());
        self.body_overlaps.diff(&mut begun, &mut ended);
        self.events.extend(
            begun
                .into_iter()
                .map(|(body_a, body_b)| WorldEvent::BeginContact { body_a, body_b }),
        );
        self.events.extend(
            ended
                .into_iter()
                .map(|(body_a, body_b)| WorldEvent::EndContact { body_a, body_b }),
        );

        let (mut begun, mut ended) = (Vec::new(), Vec::new());
        self.shape_overlaps.diff(&mut begun, &mut ended);
        self.events
            .extend(begun.into_iter().map(|((body_a, shape_a), (body_b, shape_b))| {
                WorldEvent::BeginShapeContact {
                    body_a,
                    shape_a,
                    body_b,
                    shape_b,
                }
            }));
        self.events
            .extend(ended.into_iter().map(|((body_a, shape_a), (body_b, shape_b))| {
                WorldEvent::EndShapeContact {
                    body_a,
                    shape_a,
                    body_b,
                    shape_b,
                }
            }));
    }

    /// Gathers friction, contact and constraint equations, solves them and
    /// writes the velocity corrections and multipliers back.
    fn solve(&mut self, dt: f64) -> usize {
        self.solver_bodies.clear();
        self.solver_handles.clear();
        self.solver_index.clear();
        for (handle, body) in self.bodies.iter_mut() {
            body.update_solve_mass_properties();
            self.solver_index.insert(handle, self.solver_bodies.len());
            self.solver_handles.push(handle);
            self.solver_bodies.push(SolverBody {
                position: body.position,
                velocity: body.linear_velocity,
                angular_velocity: body.angular_velocity,
                force: body.force,
                torque: body.torque,
                inv_mass: body.inv_mass_solve,
                inv_inertia_world: body.inv_inertia_world_solve,
                linear_factor: body.linear_factor,
                angular_factor: body.angular_factor,
                vlambda: Vec3::ZERO,
                wlambda: Vec3::ZERO,
            });
        }

        for constraint in self.constraints.values_mut() {
            if let (Some(a), Some(b)) = (self.bodies.get(constraint.body_a()), self.bodies.get(constraint.body_b())) {
                constraint.update(a, b);
            }
        }

        self.equations.clear();
        self.equations.extend(self.narrowphase.frictions.iter().cloned());
        self.equations.extend(self.narrowphase.contacts.iter().cloned());
        let contact_count = self.equations.len();
        for constraint in self.constraints.values() {
            self.equations
                .extend(constraint.equations().iter().filter(|eq| eq.enabled).cloned());
        }
        for eq in &mut self.equations[contact_count..] {
            let (stiffness, relaxation) = (eq.stiffness(), eq.relaxation());
            eq.set_spook_params(stiffness, relaxation, dt);
        }

        // Every equation references live bodies: removal drops their constraints
        for eq in &mut self.equations {
            if let (Some(&ia), Some(&ib)) = (self.solver_index.get(eq.body_a), self.solver_index.get(eq.body_b)) {
                eq.index_a = ia;
                eq.index_b = ib;
            }
        }

        let count = self.equations.len();
        self.solver.solve(dt, &mut self.equations, &mut self.solver_bodies);

        for (handle, solved) in self.solver_handles.iter().zip(&self.solver_bodies) {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.linear_velocity = solved.velocity;
                body.angular_velocity = solved.angular_velocity;
            }
        }

        let mut multipliers = self.equations.iter().map(Equation::multiplier);
        for eq in self
            .narrowphase
            .frictions
            .iter_mut()
            .chain(self.narrowphase.contacts.iter_mut())
        {
            if let Some(m) = multipliers.next() {
                eq.set_multiplier(m);
            }
        }
        for constraint in self.constraints.values_mut() {
            for eq in constraint.equations_mut().iter_mut().filter(|eq| eq.enabled) {
                if let Some(m) = multipliers.next() {
                    eq.set_multiplier(m);
                }
            }
        }
        count
    }

    fn update_sleep(&mut self) {
        self.has_active_bodies = false;
        for (handle, body) in self.bodies.iter_mut() {
            if self.config.allow_sleep {
                if let Some(transition) = body.sleep_tick(self.time) {
                    log::debug!("body {handle:?}: {transition:?}");
                    self.events.push(WorldEvent::from_transition(handle, transition));
                }
            }
            if body.woke_up {
                body.woke_up = false;
                self.events.push(WorldEvent::WakeUp { body: handle });
            }
            if !body.is_static() && !body.is_sleeping() {
                self.has_active_bodies = true;
            }
        }
    }
}

/// Whether sleeping `body` should be woken by touching `other`.
fn should_wake(body: &RigidBody, other: &RigidBody) -> bool {
    if !(body.allow_sleep && body.is_dynamic() && body.is_sleeping()) {
        return false;
    }
    if other.sleep_state() != SleepState::Awake || other.is_static() {
        return false;
    }
    let speed_squared = other.linear_velocity.length_squared() + other.angular_velocity.length_squared();
    speed_squared >= 2.0 * other.sleep_speed_limit * other.sleep_speed_limit
}
