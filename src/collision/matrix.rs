use std::collections::HashSet;

use crate::dynamics::BodyHandle;

/// Unordered pair of bodies.
pub type BodyPair = (BodyHandle, BodyHandle);

/// Key for an unordered pair of shapes, each named by body and shape index.
pub type ShapePair = ((BodyHandle, usize), (BodyHandle, usize));

#[inline]
pub fn body_pair(a: BodyHandle, b: BodyHandle) -> BodyPair {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[inline]
pub fn shape_pair(a: (BodyHandle, usize), b: (BodyHandle, usize)) -> ShapePair {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Records which body pairs produced contacts, this step and the last.
///
/// Used to fire the `Collide` event only for the first contact of a pair
/// that was not already touching.
#[derive(Debug, Default, Clone)]
pub struct CollisionMatrix {
    current: HashSet<BodyPair>,
    previous: HashSet<BodyPair>,
}

impl CollisionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.current.contains(&body_pair(a, b))
    }

    pub fn get_previous(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.previous.contains(&body_pair(a, b))
    }

    pub fn set(&mut self, a: BodyHandle, b: BodyHandle, value: bool) {
        let key = body_pair(a, b);
        if value {
            self.current.insert(key);
        } else {
            self.current.remove(&key);
        }
    }

    /// Rotates current into previous and starts an empty current step.
    pub fn tick(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Forgets every pair involving `body`.
    pub fn remove_body(&mut self, body: BodyHandle) {
        self.current.retain(|&(a, b)| a != body && b != body);
        self.previous.retain(|&(a, b)| a != body && b != body);
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

/// Tracks overlapping keys across two steps as sorted lists and diffs them.
#[derive(Debug, Clone)]
pub struct OverlapKeeper<K> {
    current: Vec<K>,
    previous: Vec<K>,
}

impl<K> Default for OverlapKeeper<K> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<K: Ord + Copy> OverlapKeeper<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as overlapping in the current step.
    pub fn set(&mut self, key: K) {
        if let Err(index) = self.current.binary_search(&key) {
            self.current.insert(index, key);
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.current.binary_search(key).is_ok()
    }

    /// Makes the current overlaps the previous ones and clears the current list.
    pub fn tick(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    /// Keys that overlap now but did not last step, and the reverse.
    pub fn diff(&self, additions: &mut Vec<K>, removals: &mut Vec<K>) {
        sorted_difference(&self.current, &self.previous, additions);
        sorted_difference(&self.previous, &self.current, removals);
    }

    /// Drops `pred`-matching keys from the current list, returning them.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&K) -> bool) -> Vec<K> {
        let mut removed = Vec::new();
        self.current.retain(|key| {
            if pred(key) {
                removed.push(*key);
                false
            } else {
                true
            }
        });
        self.previous.retain(|key| !pred(key));
        removed
    }

    pub fn current(&self) -> &[K] {
        &self.current
    }
}

/// Appends the elements of sorted `a` that are missing from sorted `b`.
fn sorted_difference<K: Ord + Copy>(a: &[K], b: &[K], out: &mut Vec<K>) {
    let mut j = 0;
    for &key in a {
        while j < b.len() && b[j] < key {
            j += 1;
        }
        if j >= b.len() || b[j] != key {
            out.push(key);
        }
    }
}
