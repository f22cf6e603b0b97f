use crate::dynamics::BodyHandle;
use crate::geometry::Aabb;

use super::{intersection_test, BodySet, Broadphase};

/// Sweep and prune along one world axis.
///
/// Bodies are kept sorted by the lower bound of their AABB on the sort axis.
/// The list is nearly sorted from one step to the next, so it is maintained
/// with insertion sort.
#[derive(Debug)]
pub struct SweepAndPruneBroadphase {
    axis_list: Vec<BodyHandle>,
    axis: usize,
    /// Re-pick the axis of greatest positional variance before each sweep
    pub auto_detect_axis: bool,
}

impl Default for SweepAndPruneBroadphase {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPruneBroadphase {
    pub fn new() -> Self {
        Self {
            axis_list: Vec::new(),
            axis: 0,
            auto_detect_axis: true,
        }
    }

    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Fixes the sort axis (0, 1 or 2) and turns off auto detection.
    pub fn set_axis(&mut self, axis: usize) {
        self.axis = axis.min(2);
        self.auto_detect_axis = false;
    }

    /// Picks the world axis along which body positions vary the most.
    pub fn detect_axis(&mut self, bodies: &BodySet) {
        let n = self.axis_list.len();
        if n < 2 {
            return;
        }

        let mut sum = [0.0; 3];
        let mut sum_squared = [0.0; 3];
        for &handle in &self.axis_list {
            let p = bodies[handle].position;
            for k in 0..3 {
                sum[k] += p[k];
                sum_squared[k] += p[k] * p[k];
            }
        }

        let inv_n = 1.0 / n as f64;
        let variance = |k: usize| sum_squared[k] - sum[k] * sum[k] * inv_n;
        let mut best = 0;
        for k in 1..3 {
            if variance(k) > variance(best) {
                best = k;
            }
        }

        if best != self.axis {
            log::debug!("sweep and prune axis {} -> {}", self.axis, best);
            self.axis = best;
        }
    }

    fn sync(&mut self, bodies: &BodySet) {
        self.axis_list.retain(|&handle| bodies.contains_key(handle));
        if self.axis_list.len() != bodies.len() {
            // Bodies inserted without the add hook
            for handle in bodies.keys() {
                if !self.axis_list.contains(&handle) {
                    self.axis_list.push(handle);
                }
            }
        }
    }

    fn sort(&mut self, bodies: &BodySet) {
        let axis = self.axis;
        let key = |handle: BodyHandle| bodies[handle].cached_aabb().min[axis];

        for i in 1..self.axis_list.len() {
            let current = self.axis_list[i];
            let current_key = key(current);
            let mut j = i;
            while j > 0 && key(self.axis_list[j - 1]).total_cmp(&current_key).is_gt() {
                self.axis_list[j] = self.axis_list[j - 1];
                j -= 1;
            }
            self.axis_list[j] = current;
        }
    }

    fn prepare(&mut self, bodies: &BodySet) {
        self.sync(bodies);
        if self.auto_detect_axis {
            self.detect_axis(bodies);
        }
        self.sort(bodies);
    }
}

impl Broadphase for SweepAndPruneBroadphase {
    fn collision_pairs(&mut self, bodies: &BodySet, pairs: &mut Vec<(BodyHandle, BodyHandle)>) {
        pairs.clear();
        self.prepare(bodies);

        let axis = self.axis;
        for (i, &a) in self.axis_list.iter().enumerate() {
            let body_a = &bodies[a];
            let upper = body_a.cached_aabb().max[axis];

            for &b in &self.axis_list[i + 1..] {
                let body_b = &bodies[b];
                if body_b.cached_aabb().min[axis] > upper {
                    break;
                }
                if intersection_test(body_a, body_b) {
                    pairs.push((a, b));
                }
            }
        }
    }

    fn aabb_query(&mut self, bodies: &BodySet, aabb: Aabb, result: &mut Vec<BodyHandle>) {
        self.prepare(bodies);

        let axis = self.axis;
        for &handle in &self.axis_list {
            let body_aabb = bodies[handle].cached_aabb();
            if body_aabb.min[axis] > aabb.max[axis] {
                break;
            }
            if body_aabb.overlaps(aabb) {
                result.push(handle);
            }
        }
    }

    fn add_body(&mut self, handle: BodyHandle) {
        if !self.axis_list.contains(&handle) {
            self.axis_list.push(handle);
        }
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        self.axis_list.retain(|&h| h != handle);
    }
}
