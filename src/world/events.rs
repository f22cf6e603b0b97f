use crate::dynamics::{BodyHandle, SleepTransition};
use crate::math::Vec3;

/// Something that happened during a step, collected until
/// [`World::drain_events`](super::World::drain_events) is called.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    /// Two bodies started overlapping
    BeginContact { body_a: BodyHandle, body_b: BodyHandle },
    /// Two bodies stopped overlapping, or one of them was removed
    EndContact { body_a: BodyHandle, body_b: BodyHandle },
    BeginShapeContact {
        body_a: BodyHandle,
        shape_a: usize,
        body_b: BodyHandle,
        shape_b: usize,
    },
    EndShapeContact {
        body_a: BodyHandle,
        shape_a: usize,
        body_b: BodyHandle,
        shape_b: usize,
    },
    /// First contact of a pair that was not colliding on the previous step.
    ///
    /// Reported once for each of the two bodies; `normal` points from `body`
    /// towards `other` and `contact_point` lies on `body`.
    Collide {
        body: BodyHandle,
        other: BodyHandle,
        contact_point: Vec3,
        normal: Vec3,
        /// Closing speed along the contact normal
        impact_velocity: f64,
    },
    Sleepy { body: BodyHandle },
    Sleep { body: BodyHandle },
    WakeUp { body: BodyHandle },
}

impl WorldEvent {
    pub(crate) fn from_transition(body: BodyHandle, transition: SleepTransition) -> Self {
        match transition {
            SleepTransition::Sleepy => WorldEvent::Sleepy { body },
            SleepTransition::Sleep => WorldEvent::Sleep { body },
            SleepTransition::WakeUp => WorldEvent::WakeUp { body },
        }
    }

    /// Whether the event concerns `body`.
    pub fn involves(&self, handle: BodyHandle) -> bool {
        match *self {
            WorldEvent::BeginContact { body_a, body_b }
            | WorldEvent::EndContact { body_a, body_b }
            | WorldEvent::BeginShapeContact { body_a, body_b, .. }
            | WorldEvent::EndShapeContact { body_a, body_b, .. } => body_a == handle || body_b == handle,
            WorldEvent::Collide { body, other, .. } => body == handle || other == handle,
            WorldEvent::Sleepy { body } | WorldEvent::Sleep { body } | WorldEvent::WakeUp { body } => {
                body == handle
            }
        }
    }
}
