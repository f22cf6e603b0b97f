mod naive;
mod sap;

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::dynamics::{BodyHandle, RigidBody};
use crate::geometry::Aabb;

pub use naive::NaiveBroadphase;
pub use sap::SweepAndPruneBroadphase;

/// Body storage shared by the broadphases and the world.
pub type BodySet = SlotMap<BodyHandle, RigidBody>;

/// Which broadphase a world uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BroadphaseKind {
    #[default]
    Naive,
    SweepAndPrune,
}

impl BroadphaseKind {
    pub fn build(self) -> Box<dyn Broadphase> {
        match self {
            BroadphaseKind::Naive => Box::new(NaiveBroadphase::new()),
            BroadphaseKind::SweepAndPrune => Box::new(SweepAndPruneBroadphase::new()),
        }
    }
}

/// Coarse pair search over body AABBs.
///
/// Implementations read each body's cached AABB; the world refreshes those
/// before asking for pairs.
pub trait Broadphase: fmt::Debug {
    /// Replaces `pairs` with every body pair that passes
    /// [`needs_broadphase_collision`] and whose AABBs overlap.
    fn collision_pairs(&mut self, bodies: &BodySet, pairs: &mut Vec<(BodyHandle, BodyHandle)>);

    /// Bodies whose AABB overlaps `aabb`.
    fn aabb_query(&mut self, bodies: &BodySet, aabb: Aabb, result: &mut Vec<BodyHandle>);

    fn add_body(&mut self, _handle: BodyHandle) {}

    fn remove_body(&mut self, _handle: BodyHandle) {}
}

/// Filter test applied before any geometry: collision groups must match
/// both ways, and at least one body must be able to move.
pub fn needs_broadphase_collision(a: &RigidBody, b: &RigidBody) -> bool {
    if a.collision_filter_group & b.collision_filter_mask == 0
        || b.collision_filter_group & a.collision_filter_mask == 0
    {
        return false;
    }

    let inert = |body: &RigidBody| body.is_static() || body.is_sleeping();
    !(inert(a) && inert(b))
}

/// Shared narrow test: filters then AABB overlap.
pub(crate) fn intersection_test(a: &RigidBody, b: &RigidBody) -> bool {
    needs_broadphase_collision(a, b) && a.cached_aabb().overlaps(b.cached_aabb())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyType;
    use crate::geometry::Shape;
    use crate::math::Vec3;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    fn unordered(pairs: &[(BodyHandle, BodyHandle)]) -> BTreeSet<(BodyHandle, BodyHandle)> {
        pairs
            .iter()
            .map(|&(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect()
    }

    fn insert(bodies: &mut BodySet, mut body: RigidBody) -> BodyHandle {
        body.update_aabb();
        bodies.insert(body)
    }

    #[test]
    fn test_filters() {
        let a = RigidBody::new(1.0).with_collision_filter(1, 2);
        let b = RigidBody::new(1.0).with_collision_filter(2, 1);
        let c = RigidBody::new(1.0).with_collision_filter(4, u32::MAX);
        assert!(needs_broadphase_collision(&a, &b));
        assert!(!needs_broadphase_collision(&a, &c));

        let ground = RigidBody::new(0.0);
        let other_ground = RigidBody::new(0.0);
        assert!(!needs_broadphase_collision(&ground, &other_ground));

        let mut sleeper = RigidBody::new(1.0);
        sleeper.sleep();
        assert!(!needs_broadphase_collision(&ground, &sleeper));

        let kinematic = RigidBody::new(1.0).with_type(BodyType::Kinematic);
        assert!(needs_broadphase_collision(&ground, &kinematic));
    }

    #[test]
    fn test_naive_and_sap_agree() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..20 {
            let mut bodies = BodySet::with_key();
            let mut sap = SweepAndPruneBroadphase::new();
            for _ in 0..40 {
                let position = Vec3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-2.0..2.0),
                );
                let shape = if rng.gen_bool(0.5) {
                    Shape::sphere(rng.gen_range(0.2..1.0))
                } else {
                    Shape::cuboid(Vec3::new(
                        rng.gen_range(0.1..1.0),
                        rng.gen_range(0.1..1.0),
                        rng.gen_range(0.1..1.0),
                    ))
                };
                let mass = if rng.gen_bool(0.2) { 0.0 } else { 1.0 };
                let handle = insert(
                    &mut bodies,
                    RigidBody::new(mass).with_shape(shape).with_position(position),
                );
                sap.add_body(handle);
            }

            let mut naive_pairs = Vec::new();
            let mut sap_pairs = Vec::new();
            NaiveBroadphase::new().collision_pairs(&bodies, &mut naive_pairs);
            sap.collision_pairs(&bodies, &mut sap_pairs);

            assert_eq!(naive_pairs.len(), sap_pairs.len());
            assert_eq!(unordered(&naive_pairs), unordered(&sap_pairs));
        }
    }

    #[test]
    fn test_aabb_queries_agree() {
        let mut bodies = BodySet::with_key();
        let mut sap = SweepAndPruneBroadphase::new();
        for i in 0..10 {
            let handle = insert(
                &mut bodies,
                RigidBody::new(1.0)
                    .with_shape(Shape::sphere(0.5))
                    .with_position(Vec3::new(i as f64 * 2.0, 0.0, 0.0)),
            );
            sap.add_body(handle);
        }
        let query = Aabb::new(Vec3::new(3.0, -1.0, -1.0), Vec3::new(8.0, 1.0, 1.0));

        let mut naive_hits = Vec::new();
        let mut sap_hits = Vec::new();
        NaiveBroadphase::new().aabb_query(&bodies, query, &mut naive_hits);
        sap.aabb_query(&bodies, query, &mut sap_hits);
        naive_hits.sort();
        sap_hits.sort();

        // Spheres at x = 4, 6, 8 overlap; the one at 2 ends at 2.5
        assert_eq!(naive_hits.len(), 3);
        assert_eq!(naive_hits, sap_hits);
    }
}
