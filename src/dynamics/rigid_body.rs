use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::geometry::{box_inertia, Aabb, Geometry, Shape};
use crate::material::MaterialHandle;
use crate::math::{Mat3, Quat, Transform, Vec3};

new_key_type! {
    /// Stable handle of a body inside a [`World`](crate::World).
    ///
    /// Handles are generational: once a body is removed its handle never
    /// resolves again, even if the slot is reused.
    pub struct BodyHandle;
}

/// The type of rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Affected by forces and contacts
    #[default]
    Dynamic,
    /// Never moves
    Static,
    /// Moves with its velocity, unaffected by forces and contacts
    Kinematic,
}

/// Sleep classification of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SleepState {
    #[default]
    Awake,
    Sleepy,
    Sleeping,
}

/// Sleep transition reported by [`RigidBody::sleep_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTransition {
    Sleepy,
    Sleep,
    WakeUp,
}

/// A shape attached to a body at a fixed local offset and orientation.
#[derive(Debug, Clone)]
pub struct BodyShape {
    pub shape: Shape,
    pub offset: Vec3,
    pub orientation: Quat,
}

impl BodyShape {
    fn is_centered(&self) -> bool {
        self.offset == Vec3::ZERO && self.orientation == Quat::IDENTITY
    }
}

/// A rigid body in the physics simulation
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub body_type: BodyType,

    /// Position in world space
    pub position: Vec3,
    /// Orientation in world space
    pub rotation: Quat,
    pub previous_position: Vec3,
    pub previous_rotation: Quat,
    /// Pose blended between the last two steps by the leftover accumulator
    pub interpolated_position: Vec3,
    pub interpolated_rotation: Quat,

    pub linear_velocity: Vec3,
    /// Angular velocity (in radians per second)
    pub angular_velocity: Vec3,

    /// Accumulated force (reset each step)
    pub force: Vec3,
    /// Accumulated torque (reset each step)
    pub torque: Vec3,

    mass: f64,
    inv_mass: f64,
    inertia: Vec3,
    inv_inertia: Vec3,
    inv_inertia_world: Mat3,
    pub(crate) inv_mass_solve: f64,
    pub(crate) inv_inertia_world_solve: Mat3,

    pub linear_damping: f64,
    pub angular_damping: f64,
    /// Per-axis multiplier on linear velocity changes; zero locks the axis
    pub linear_factor: Vec3,
    /// Per-axis multiplier on angular velocity changes; zero locks the axis
    pub angular_factor: Vec3,
    fixed_rotation: bool,

    shapes: Vec<BodyShape>,
    pub material: Option<MaterialHandle>,
    pub collision_filter_group: u32,
    pub collision_filter_mask: u32,
    /// When false, contacts are detected and reported but not resolved
    pub collision_response: bool,

    pub allow_sleep: bool,
    sleep_state: SleepState,
    /// Speed below which the body is considered resting
    pub sleep_speed_limit: f64,
    /// Seconds of rest after which a sleepy body falls asleep
    pub sleep_time_limit: f64,
    time_last_sleepy: f64,
    pub(crate) wake_up_after_narrowphase: bool,
    pub(crate) woke_up: bool,

    aabb: Aabb,
    aabb_needs_update: bool,
    bounding_radius: f64,

    /// Optional user data
    pub user_data: u64,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl RigidBody {
    /// Creates a body of the given mass: dynamic if `mass > 0`, static otherwise.
    pub fn new(mass: f64) -> Self {
        let mass = mass.max(0.0);
        let mut body = Self {
            body_type: if mass > 0.0 {
                BodyType::Dynamic
            } else {
                BodyType::Static
            },
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            previous_position: Vec3::ZERO,
            previous_rotation: Quat::IDENTITY,
            interpolated_position: Vec3::ZERO,
            interpolated_rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            inv_mass_solve: 0.0,
            inv_inertia_world_solve: Mat3::ZERO,
            linear_damping: 0.01,
            angular_damping: 0.01,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            fixed_rotation: false,
            shapes: Vec::new(),
            material: None,
            collision_filter_group: 1,
            collision_filter_mask: u32::MAX,
            collision_response: true,
            allow_sleep: true,
            sleep_state: SleepState::Awake,
            sleep_speed_limit: 0.1,
            sleep_time_limit: 1.0,
            time_last_sleepy: 0.0,
            wake_up_after_narrowphase: false,
            woke_up: false,
            aabb: Aabb::EMPTY,
            aabb_needs_update: true,
            bounding_radius: 0.0,
            user_data: 0,
        };
        body.update_mass_properties();
        body
    }

    pub fn with_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self.update_mass_properties();
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    /// Sets the mass; a dynamic body keeps its type even at zero mass.
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass.max(0.0);
        self.update_mass_properties();
        self
    }

    /// Attaches a shape at the body origin.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.add_shape(shape, Vec3::ZERO, Quat::IDENTITY);
        self
    }

    pub fn with_shape_offset(mut self, shape: Shape, offset: Vec3, orientation: Quat) -> Self {
        self.add_shape(shape, offset, orientation);
        self
    }

    pub fn with_material(mut self, material: MaterialHandle) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_linear_damping(mut self, damping: f64) -> Self {
        self.linear_damping = damping.clamp(0.0, 1.0);
        self
    }

    pub fn with_angular_damping(mut self, damping: f64) -> Self {
        self.angular_damping = damping.clamp(0.0, 1.0);
        self
    }

    pub fn with_linear_factor(mut self, factor: Vec3) -> Self {
        self.linear_factor = factor;
        self
    }

    pub fn with_angular_factor(mut self, factor: Vec3) -> Self {
        self.angular_factor = factor;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self.update_mass_properties();
        self
    }

    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    pub fn with_collision_response(mut self, collision_response: bool) -> Self {
        self.collision_response = collision_response;
        self
    }

    pub fn with_allow_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub fn with_sleep_limits(mut self, speed_limit: f64, time_limit: f64) -> Self {
        self.sleep_speed_limit = speed_limit;
        self.sleep_time_limit = time_limit;
        self
    }

    /// Teleports the body; previous and interpolated poses follow.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.previous_position = position;
        self.interpolated_position = position;
        self.aabb_needs_update = true;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        let rotation = rotation.normalize();
        self.rotation = rotation;
        self.previous_rotation = rotation;
        self.interpolated_rotation = rotation;
        self.aabb_needs_update = true;
        self.update_inertia_world();
    }

    pub fn add_shape(&mut self, shape: Shape, offset: Vec3, orientation: Quat) {
        self.shapes.push(BodyShape {
            shape,
            offset,
            orientation: orientation.normalize(),
        });
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
    }

    /// Detaches and returns shape `index`, if present.
    pub fn remove_shape(&mut self, index: usize) -> Option<BodyShape> {
        if index >= self.shapes.len() {
            return None;
        }
        let removed = self.shapes.remove(index);
        self.update_mass_properties();
        self.update_bounding_radius();
        self.aabb_needs_update = true;
        Some(removed)
    }

    pub fn shapes(&self) -> &[BodyShape] {
        &self.shapes
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Diagonal of the local inertia tensor.
    #[inline]
    pub fn inertia(&self) -> Vec3 {
        self.inertia
    }

    #[inline]
    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    /// World-space inverse inertia `R * I^-1 * R^T`.
    #[inline]
    pub fn inv_inertia_world(&self) -> Mat3 {
        self.inv_inertia_world
    }

    #[inline]
    pub fn fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    #[inline]
    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    #[inline]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// Recomputes inverse mass and inertia from mass, shapes and type.
    ///
    /// A single centred shape contributes its own inertia; anything else is
    /// approximated by the box inertia of the body's local AABB. Zero inertia
    /// components invert to zero, which locks rotation about that axis.
    pub fn update_mass_properties(&mut self) {
        let dynamic = self.is_dynamic();
        self.inv_mass = if dynamic && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        };

        self.inertia = match self.shapes.as_slice() {
            [single] if single.is_centered() => {
                single.shape.geometry().calculate_local_inertia(self.mass)
            }
            [] => Vec3::ZERO,
            _ => match self.local_aabb() {
                Some(aabb) => box_inertia(aabb.half_extents(), self.mass),
                None => Vec3::ZERO,
            },
        };

        self.inv_inertia = if dynamic && !self.fixed_rotation {
            self.inertia.recip_or_zero()
        } else {
            Vec3::ZERO
        };

        let only_particles = self
            .shapes
            .iter()
            .all(|s| matches!(s.shape.geometry(), Geometry::Particle));
        if dynamic
            && self.mass > 0.0
            && !self.fixed_rotation
            && !only_particles
            && self.inertia.min_element() <= 0.0
        {
            log::warn!(
                "body inertia {:?} is singular; rotation is locked about the degenerate axes",
                self.inertia
            );
        }

        self.update_inertia_world();
    }

    /// Refreshes the world-space inverse inertia from the current orientation.
    pub fn update_inertia_world(&mut self) {
        self.inv_inertia_world = if self.inv_inertia == Vec3::ZERO {
            Mat3::ZERO
        } else {
            Mat3::rotate_diagonal(Mat3::from_quat(self.rotation), self.inv_inertia)
        };
    }

    /// Inverse mass and inertia as seen by the solver: zero unless dynamic and awake.
    pub fn update_solve_mass_properties(&mut self) {
        if self.is_sleeping() || !self.is_dynamic() {
            self.inv_mass_solve = 0.0;
            self.inv_inertia_world_solve = Mat3::ZERO;
        } else {
            self.inv_mass_solve = self.inv_mass;
            self.inv_inertia_world_solve = self.inv_inertia_world;
        }
    }

    fn local_aabb(&self) -> Option<Aabb> {
        let mut result: Option<Aabb> = None;
        for s in &self.shapes {
            if let Some(local) = s.shape.geometry().local_aabb() {
                let posed = local.transformed(s.offset, s.orientation);
                result = Some(result.map_or(posed, |r| r.union(posed)));
            }
        }
        result
    }

    fn update_bounding_radius(&mut self) {
        self.bounding_radius = self
            .shapes
            .iter()
            .map(|s| s.offset.length() + s.shape.bounding_sphere_radius())
            .fold(0.0, f64::max);
    }

    /// Body frame in world space.
    #[inline]
    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    /// World pose of shape `index`.
    pub fn shape_world_pose(&self, index: usize) -> (Vec3, Quat) {
        let s = &self.shapes[index];
        let pose = self.transform().compose(Transform::new(s.offset, s.orientation));
        (pose.position, pose.rotation)
    }

    /// Marks the cached AABB stale, e.g. after moving the body by hand.
    pub fn invalidate_aabb(&mut self) {
        self.aabb_needs_update = true;
    }

    /// World-space AABB, recomputed if the pose changed since the last call.
    pub fn aabb(&mut self) -> Aabb {
        if self.aabb_needs_update {
            self.update_aabb();
        }
        self.aabb
    }

    /// Last computed AABB without refreshing it.
    pub fn cached_aabb(&self) -> Aabb {
        self.aabb
    }

    pub fn update_aabb(&mut self) {
        let mut aabb = Aabb::EMPTY;
        for index in 0..self.shapes.len() {
            let (position, rotation) = self.shape_world_pose(index);
            aabb = aabb.union(self.shapes[index].shape.geometry().world_aabb(position, rotation));
        }
        self.aabb = aabb;
        self.aabb_needs_update = false;
    }

    pub fn apply_force(&mut self, force: Vec3) {
        if self.is_dynamic() {
            self.force += force;
        }
    }

    /// Applies a force at a world point
    pub fn apply_force_at_point(&mut self, force: Vec3, world_point: Vec3) {
        if self.is_dynamic() {
            self.force += force;
            self.torque += (world_point - self.position).cross(force);
        }
    }

    /// Applies a body-frame force at a body-frame point.
    pub fn apply_local_force(&mut self, local_force: Vec3, local_point: Vec3) {
        let force = self.vector_to_world_frame(local_force);
        let point = self.point_to_world_frame(local_point);
        self.apply_force_at_point(force, point);
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_dynamic() {
            self.torque += torque;
        }
    }

    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.is_dynamic() {
            self.linear_velocity += (impulse * self.inv_mass).component_mul(self.linear_factor);
        }
    }

    /// Applies an impulse at a world point
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, world_point: Vec3) {
        if self.is_dynamic() {
            self.apply_impulse(impulse);
            let r = world_point - self.position;
            self.angular_velocity +=
                (self.inv_inertia_world * r.cross(impulse)).component_mul(self.angular_factor);
        }
    }

    pub fn velocity_at_world_point(&self, world_point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(world_point - self.position)
    }

    pub fn point_to_local_frame(&self, world_point: Vec3) -> Vec3 {
        self.transform().inverse_transform_point(world_point)
    }

    pub fn point_to_world_frame(&self, local_point: Vec3) -> Vec3 {
        self.transform().transform_point(local_point)
    }

    pub fn vector_to_local_frame(&self, world_vector: Vec3) -> Vec3 {
        self.transform().inverse_transform_vector(world_vector)
    }

    pub fn vector_to_world_frame(&self, local_vector: Vec3) -> Vec3 {
        self.transform().transform_vector(local_vector)
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    /// Wakes the body. A `WakeUp` event is reported if it was sleeping.
    pub fn wake_up(&mut self) {
        if self.sleep_state == SleepState::Sleeping {
            self.woke_up = true;
        }
        self.sleep_state = SleepState::Awake;
        self.wake_up_after_narrowphase = false;
    }

    /// Puts the body to sleep immediately, zeroing its motion.
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.wake_up_after_narrowphase = false;
    }

    /// Advances the sleep state machine at simulation time `time`.
    pub fn sleep_tick(&mut self, time: f64) -> Option<SleepTransition> {
        if !self.allow_sleep {
            return None;
        }

        let speed_squared =
            self.linear_velocity.length_squared() + self.angular_velocity.length_squared();
        let limit_squared = self.sleep_speed_limit * self.sleep_speed_limit;

        match self.sleep_state {
            SleepState::Awake if speed_squared < limit_squared => {
                self.sleep_state = SleepState::Sleepy;
                self.time_last_sleepy = time;
                Some(SleepTransition::Sleepy)
            }
            SleepState::Sleepy if speed_squared > limit_squared => {
                self.wake_up();
                Some(SleepTransition::WakeUp)
            }
            SleepState::Sleepy if time - self.time_last_sleepy > self.sleep_time_limit => {
                self.sleep();
                Some(SleepTransition::Sleep)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_decides_type() {
        let body = RigidBody::new(2.0);
        assert!(body.is_dynamic());
        assert!((body.inv_mass() - 0.5).abs() < 1e-12);

        let ground = RigidBody::new(0.0);
        assert!(ground.is_static());
        assert_eq!(ground.inv_mass(), 0.0);

        let kinematic = RigidBody::new(3.0).with_type(BodyType::Kinematic);
        assert_eq!(kinematic.inv_mass(), 0.0);
    }

    #[test]
    fn test_sphere_inertia_and_world_tensor() {
        let body = RigidBody::new(5.0)
            .with_shape(Shape::sphere(2.0))
            .with_rotation(Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7));
        assert!(body.inertia().almost_equals(Vec3::splat(8.0), 1e-12));
        let expected = Mat3::from_diagonal(Vec3::splat(1.0 / 8.0));
        for i in 0..3 {
            assert!(body.inv_inertia_world().cols[i].almost_equals(expected.cols[i], 1e-12));
        }
    }

    #[test]
    fn test_offset_shapes_use_aabb_inertia() {
        let body = RigidBody::new(1.0)
            .with_shape_offset(Shape::sphere(0.5), Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY)
            .with_shape_offset(Shape::sphere(0.5), Vec3::new(-1.0, 0.0, 0.0), Quat::IDENTITY);
        let expected = box_inertia(Vec3::new(1.5, 0.5, 0.5), 1.0);
        assert!(body.inertia().almost_equals(expected, 1e-12));
        assert!((body.bounding_radius() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_rotation_zeroes_inverse_inertia() {
        let body = RigidBody::new(1.0)
            .with_shape(Shape::cuboid(Vec3::ONE))
            .with_fixed_rotation(true);
        assert_eq!(body.inv_inertia(), Vec3::ZERO);
        assert_eq!(body.inv_inertia_world(), Mat3::ZERO);
    }

    #[test]
    fn test_aabb_follows_pose() {
        let mut body = RigidBody::new(1.0)
            .with_shape(Shape::cuboid(Vec3::new(1.0, 0.5, 0.5)))
            .with_position(Vec3::new(0.0, 3.0, 0.0));
        let aabb = body.aabb();
        assert!(aabb.min.almost_equals(Vec3::new(-1.0, 2.5, -0.5), 1e-12));

        body.set_position(Vec3::new(10.0, 0.0, 0.0));
        assert!(body.aabb().max.almost_equals(Vec3::new(11.0, 0.5, 0.5), 1e-12));
    }

    #[test]
    fn test_impulse_at_point_spins() {
        let mut body = RigidBody::new(1.0).with_shape(Shape::sphere(1.0));
        body.apply_impulse_at_point(Vec3::X, Vec3::new(0.0, 1.0, 0.0));
        assert!(body.linear_velocity.almost_equals(Vec3::X, 1e-12));
        // r x J = (0,1,0) x (1,0,0) = (0,0,-1)
        assert!(body.angular_velocity.z < 0.0);

        let v = body.velocity_at_world_point(Vec3::new(0.0, 1.0, 0.0));
        assert!(v.x > body.linear_velocity.x);
    }

    #[test]
    fn test_frame_conversions() {
        let body = RigidBody::new(1.0)
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_axis_angle(Vec3::Y, 1.2));
        let p = Vec3::new(0.3, -0.1, 0.8);
        assert!(body
            .point_to_local_frame(body.point_to_world_frame(p))
            .almost_equals(p, 1e-12));
        assert!(body
            .vector_to_local_frame(body.vector_to_world_frame(p))
            .almost_equals(p, 1e-12));
    }

    #[test]
    fn test_sleep_state_machine() {
        let mut body = RigidBody::new(1.0).with_sleep_limits(0.1, 1.0);
        assert_eq!(body.sleep_tick(0.0), Some(SleepTransition::Sleepy));
        assert_eq!(body.sleep_state(), SleepState::Sleepy);
        assert_eq!(body.sleep_tick(0.5), None);
        assert_eq!(body.sleep_tick(1.01), Some(SleepTransition::Sleep));
        assert!(body.is_sleeping());
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);

        body.wake_up();
        assert_eq!(body.sleep_state(), SleepState::Awake);
        assert!(body.woke_up);
    }

    #[test]
    fn test_sleepy_body_wakes_on_motion() {
        let mut body = RigidBody::new(1.0);
        body.sleep_tick(0.0);
        body.linear_velocity = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(body.sleep_tick(0.1), Some(SleepTransition::WakeUp));
        assert_eq!(body.sleep_state(), SleepState::Awake);
    }
}
