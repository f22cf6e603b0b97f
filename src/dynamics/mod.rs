mod integrator;
mod rigid_body;

pub use integrator::{apply_damping, integrate_body, QuatNormalization};
pub use rigid_body::{BodyHandle, BodyShape, BodyType, RigidBody, SleepState, SleepTransition};
