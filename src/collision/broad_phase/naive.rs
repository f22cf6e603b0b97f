use crate::dynamics::BodyHandle;
use crate::geometry::Aabb;

use super::{intersection_test, BodySet, Broadphase};

/// Tests every body against every other body.
#[derive(Debug, Default)]
pub struct NaiveBroadphase {
    handles: Vec<BodyHandle>,
}

impl NaiveBroadphase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Broadphase for NaiveBroadphase {
    fn collision_pairs(&mut self, bodies: &BodySet, pairs: &mut Vec<(BodyHandle, BodyHandle)>) {
        pairs.clear();
        self.handles.clear();
        self.handles.extend(bodies.keys());

        for (i, &a) in self.handles.iter().enumerate() {
            for &b in &self.handles[i + 1..] {
                if intersection_test(&bodies[a], &bodies[b]) {
                    pairs.push((a, b));
                }
            }
        }
    }

    fn aabb_query(&mut self, bodies: &BodySet, aabb: Aabb, result: &mut Vec<BodyHandle>) {
        result.extend(
            bodies
                .iter()
                .filter(|(_, body)| body.cached_aabb().overlaps(aabb))
                .map(|(handle, _)| handle),
        );
    }
}
