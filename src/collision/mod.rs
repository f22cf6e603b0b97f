pub mod broad_phase;
pub mod contact;
pub mod matrix;
pub mod narrow_phase;

pub use broad_phase::{Broadphase, BroadphaseKind, NaiveBroadphase, SweepAndPruneBroadphase};
pub use contact::ContactPoint;
pub use matrix::{BodyPair, CollisionMatrix, OverlapKeeper, ShapePair};
pub use narrow_phase::{collide, is_supported, Manifold, Narrowphase, PairMaterial, ShapePose};
