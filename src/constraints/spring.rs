use crate::dynamics::{BodyHandle, RigidBody};
use crate::math::Vec3;

/// A damped Hookean spring between anchor points on two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Spring {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub rest_length: f64,
    pub stiffness: f64,
    pub damping: f64,
    /// Anchor on body A, local frame
    pub local_anchor_a: Vec3,
    /// Anchor on body B, local frame
    pub local_anchor_b: Vec3,
}

impl Spring {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            body_a,
            body_b,
            rest_length: 1.0,
            stiffness: 100.0,
            damping: 1.0,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
        }
    }

    pub fn with_rest_length(mut self, rest_length: f64) -> Self {
        self.rest_length = rest_length;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_local_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    pub fn world_anchor_a(&self, body_a: &RigidBody) -> Vec3 {
        body_a.point_to_world_frame(self.local_anchor_a)
    }

    pub fn world_anchor_b(&self, body_b: &RigidBody) -> Vec3 {
        body_b.point_to_world_frame(self.local_anchor_b)
    }

    /// Adds the spring force and its torques to both bodies' accumulators.
    pub fn apply_force(&self, body_a: &mut RigidBody, body_b: &mut RigidBody) {
        let anchor_a = self.world_anchor_a(body_a);
        let anchor_b = self.world_anchor_b(body_b);
        let ri = anchor_a - body_a.position;
        let rj = anchor_b - body_b.position;

        let r = anchor_b - anchor_a;
        let length = r.length();
        let Some(direction) = r.try_normalize() else {
            return;
        };

        let relative_velocity = body_b.linear_velocity + body_b.angular_velocity.cross(rj)
            - body_a.linear_velocity
            - body_a.angular_velocity.cross(ri);

        let f = direction
            * -(self.stiffness * (length - self.rest_length)
                + self.damping * relative_velocity.dot(direction));

        body_a.apply_force(-f);
        body_b.apply_force(f);
        body_a.apply_torque(-ri.cross(f));
        body_b.apply_torque(rj.cross(f));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::test_support::handles;

    #[test]
    fn test_stretched_spring_pulls_together() {
        let (a, b) = handles();
        let mut body_a = RigidBody::new(1.0);
        let mut body_b = RigidBody::new(1.0).with_position(Vec3::new(3.0, 0.0, 0.0));
        let spring = Spring::new(a, b).with_rest_length(1.0).with_stiffness(10.0).with_damping(0.0);
        spring.apply_force(&mut body_a, &mut body_b);

        assert!(body_a.force.almost_equals(Vec3::new(20.0, 0.0, 0.0), 1e-12));
        assert!(body_b.force.almost_equals(Vec3::new(-20.0, 0.0, 0.0), 1e-12));
        assert_eq!(body_a.torque, Vec3::ZERO);
    }

    #[test]
    fn test_damping_resists_separation() {
        let (a, b) = handles();
        let mut body_a = RigidBody::new(1.0);
        let mut body_b = RigidBody::new(1.0)
            .with_position(Vec3::new(1.0, 0.0, 0.0))
            .with_velocity(Vec3::new(2.0, 0.0, 0.0));
        let spring = Spring::new(a, b).with_damping(0.5);
        spring.apply_force(&mut body_a, &mut body_b);
        assert!(body_b.force.x < 0.0);
    }

    #[test]
    fn test_offset_anchor_produces_torque() {
        let (a, b) = handles();
        let mut body_a = RigidBody::new(1.0);
        let mut body_b = RigidBody::new(0.0).with_position(Vec3::new(0.0, 5.0, 0.0));
        let spring = Spring::new(a, b).with_local_anchors(Vec3::X, Vec3::ZERO);
        spring.apply_force(&mut body_a, &mut body_b);
        assert!(body_a.torque.length() > 0.0);
        // Static bodies accumulate nothing
        assert_eq!(body_b.force, Vec3::ZERO);
    }
}
