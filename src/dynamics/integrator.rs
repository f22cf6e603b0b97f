use super::rigid_body::RigidBody;

/// How orientations are renormalized after integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuatNormalization {
    /// Normalize on every `skip + 1`-th step only
    pub skip: u32,
    /// Use the second-order approximation instead of an exact normalize
    pub fast: bool,
}

impl QuatNormalization {
    /// Whether orientations get renormalized on step number `step`.
    pub fn applies_to(&self, step: u64) -> bool {
        step % (u64::from(self.skip) + 1) == 0
    }
}

/// Applies velocity damping: `v *= (1 - damping)^dt`.
pub fn apply_damping(body: &mut RigidBody, dt: f64) {
    if !body.is_dynamic() {
        return;
    }

    body.linear_velocity *= (1.0 - body.linear_damping).powf(dt);
    body.angular_velocity *= (1.0 - body.angular_damping).powf(dt);
}

/// Semi-implicit Euler step of one body.
///
/// Dynamic bodies take their accumulated force and torque into velocity first;
/// kinematic bodies only move with the velocity they have. Sleeping and static
/// bodies are left untouched.
pub fn integrate_body(body: &mut RigidBody, dt: f64, normalize: Option<QuatNormalization>) {
    if body.is_static() || body.is_sleeping() {
        return;
    }

    if body.is_dynamic() {
        let linear = (body.force * (body.inv_mass() * dt)).component_mul(body.linear_factor);
        let angular =
            (body.inv_inertia_world() * body.torque * dt).component_mul(body.angular_factor);
        body.linear_velocity += linear;
        body.angular_velocity += angular;
    }

    body.position += body.linear_velocity * dt;

    if !body.fixed_rotation() {
        let rotation = body
            .rotation
            .integrate(body.angular_velocity, dt, body.angular_factor);
        body.rotation = match normalize {
            Some(QuatNormalization { fast: true, .. }) => rotation.normalize_fast(),
            Some(_) => rotation.normalize(),
            None => rotation,
        };
    }

    body.invalidate_aabb();
    body.update_inertia_world();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyType;
    use crate::geometry::Shape;
    use crate::math::{consts::PI, Quat, Vec3};

    const EXACT: Option<QuatNormalization> = Some(QuatNormalization {
        skip: 0,
        fast: false,
    });

    #[test]
    fn test_gravity_integration() {
        let mut body = RigidBody::new(1.0).with_position(Vec3::ZERO);
        let dt = 1.0 / 60.0;
        body.apply_force(Vec3::new(0.0, -9.82, 0.0));

        integrate_body(&mut body, dt, EXACT);

        assert!((body.linear_velocity.y + 9.82 * dt).abs() < 1e-12);
        // Semi-implicit: the new velocity moves the body
        assert!((body.position.y - body.linear_velocity.y * dt).abs() < 1e-12);
    }

    #[test]
    fn test_static_body_no_integration() {
        let mut body = RigidBody::new(1.0)
            .with_type(BodyType::Static)
            .with_velocity(Vec3::X);
        integrate_body(&mut body, 1.0 / 60.0, EXACT);
        assert_eq!(body.position, Vec3::ZERO);
    }

    #[test]
    fn test_kinematic_ignores_force() {
        let mut body = RigidBody::new(1.0)
            .with_type(BodyType::Kinematic)
            .with_velocity(Vec3::X);
        body.force = Vec3::new(0.0, -100.0, 0.0);
        integrate_body(&mut body, 0.5, EXACT);
        assert!(body.position.almost_equals(Vec3::new(0.5, 0.0, 0.0), 1e-12));
        assert_eq!(body.linear_velocity, Vec3::X);
    }

    #[test]
    fn test_sleeping_body_stays_put() {
        let mut body = RigidBody::new(1.0);
        body.sleep();
        body.force = Vec3::new(0.0, -10.0, 0.0);
        integrate_body(&mut body, 0.1, EXACT);
        assert_eq!(body.position, Vec3::ZERO);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_angular_velocity_integration() {
        let mut body = RigidBody::new(1.0).with_shape(Shape::sphere(1.0));
        body.angular_velocity = Vec3::new(0.0, 0.0, PI);

        let steps = 1000;
        for _ in 0..steps {
            integrate_body(&mut body, 1.0 / steps as f64, EXACT);
        }

        // Half a turn about Z maps +X onto -X
        let local_x = body.rotation.rotate_vec(Vec3::X);
        assert!(local_x.x < -0.99);
        assert!((body.rotation.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fast_normalization_keeps_unit_length() {
        let mut body = RigidBody::new(1.0).with_shape(Shape::cuboid(Vec3::ONE));
        body.angular_velocity = Vec3::new(1.0, 2.0, -0.5);
        for _ in 0..600 {
            integrate_body(
                &mut body,
                1.0 / 60.0,
                Some(QuatNormalization {
                    skip: 0,
                    fast: true,
                }),
            );
        }
        assert!((body.rotation.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_angular_factor_locks_axis() {
        let mut body = RigidBody::new(1.0)
            .with_shape(Shape::cuboid(Vec3::ONE))
            .with_angular_factor(Vec3::new(1.0, 0.0, 1.0));
        body.angular_velocity = Vec3::new(0.0, 3.0, 0.0);
        integrate_body(&mut body, 0.1, EXACT);
        assert!((body.rotation.dot(Quat::IDENTITY).abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_damping() {
        let mut body = RigidBody::new(1.0)
            .with_linear_damping(0.1)
            .with_velocity(Vec3::new(10.0, 0.0, 0.0));
        apply_damping(&mut body, 1.0);
        assert!((body.linear_velocity.x - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalization_schedule() {
        let every_third = QuatNormalization { skip: 2, fast: false };
        assert!(every_third.applies_to(0));
        assert!(!every_third.applies_to(1));
        assert!(!every_third.applies_to(2));
        assert!(every_third.applies_to(3));
    }
}
